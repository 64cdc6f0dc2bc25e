//! Typed wire messages.
//!
//! Every frame is a single JSON object with a mandatory `type` field.
//! [`ServerMessage`] covers the inbound kinds the engine consumes,
//! [`ClientMessage`] the outbound kinds it produces. Unknown inbound kinds
//! are detected *before* typed deserialization (see
//! [`is_known_kind`]) so the router can tell "unimplemented type" apart
//! from "malformed payload".

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Wire identifier for a thing. Assigned by the server, stable for the
/// lifetime of the thing.
pub type ThingId = i64;

// ── StateValue ───────────────────────────────────────────────────────

/// A single reported or commanded value. Exactly one variant per update,
/// matching the thing's type-determined capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Float(f64),
    Text(String),
}

// ── Inbound payloads ─────────────────────────────────────────────────

/// One entry of a `things` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingSnapshot {
    pub id: ThingId,
    #[serde(rename = "type")]
    pub thing_type: String,
    pub name: String,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub ordering: i64,
    /// View names this thing belongs to.
    #[serde(default)]
    pub views: Vec<String>,
}

/// One entry of a `states` message. The server populates exactly one of
/// the `status_*` fields per report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateReport {
    pub thing_id: ThingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_bool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_float: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_str: Option<String>,
}

impl StateReport {
    /// Collapse the three optional status fields into the populated variant.
    pub fn value(&self) -> Option<StateValue> {
        if let Some(b) = self.status_bool {
            Some(StateValue::Bool(b))
        } else if let Some(f) = self.status_float {
            Some(StateValue::Float(f))
        } else {
            self.status_str.clone().map(StateValue::Text)
        }
    }
}

/// A `{value, text}` choice for a select field in the edit dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub text: String,
}

/// Payload of an `edit_data` message with kind `thing`: everything the
/// edit dialog needs to populate its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingEditData {
    /// `None` when creating a new thing.
    #[serde(default)]
    pub id: Option<ThingId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub thing_type: String,
    /// When set, the thing is device-backed and its type is fixed.
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub vnode: Option<String>,
    #[serde(default)]
    pub visible: bool,
    /// Selectable thing types.
    #[serde(default)]
    pub types: Vec<Choice>,
    /// Selectable views.
    #[serde(default)]
    pub views: Vec<Choice>,
    /// Views the thing currently belongs to.
    #[serde(default)]
    pub thing_views: Vec<String>,
}

/// One entry of a `rules` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleState {
    pub name: String,
    pub state: bool,
}

/// One entry of a `timers` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerDescriptor {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rule_id: Option<i64>,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Next scheduled firing, if the timer is armed. Drives the
    /// countdown display.
    #[serde(default)]
    pub next_fire: Option<DateTime<Utc>>,
}

// ── ServerMessage ────────────────────────────────────────────────────

/// Inbound messages, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Things {
        things: Vec<ThingSnapshot>,
    },
    States {
        states: Vec<StateReport>,
    },
    /// View name → member thing ids. Iteration order is semantic: the
    /// first view is the fallback when no fragment hint matches.
    Views {
        views: IndexMap<String, Vec<ThingId>>,
    },
    /// Thing id (as a JSON object key, hence a string) → last-seen
    /// timestamp, or `null` for never seen.
    LastSeen {
        last_seen: IndexMap<String, Option<DateTime<Utc>>>,
    },
    EditData {
        kind: String,
        data: ThingEditData,
    },
    EditOk {},
    EditSave {},
    Cookie {
        name: String,
        value: String,
        #[serde(default)]
        max_age: Option<i64>,
    },
    AuthRequired {},
    AuthOk {
        #[serde(default)]
        level: Option<String>,
    },
    AuthFailed {},
    Rules {
        rules: Vec<RuleState>,
    },
    Timers {
        timers: Vec<TimerDescriptor>,
        #[serde(default)]
        rules: Vec<String>,
    },
    Msg {
        #[serde(alias = "msg")]
        message: String,
    },
}

impl ServerMessage {
    /// The wire discriminator, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Things { .. } => "things",
            Self::States { .. } => "states",
            Self::Views { .. } => "views",
            Self::LastSeen { .. } => "last_seen",
            Self::EditData { .. } => "edit_data",
            Self::EditOk {} => "edit_ok",
            Self::EditSave {} => "edit_save",
            Self::Cookie { .. } => "cookie",
            Self::AuthRequired {} => "auth_required",
            Self::AuthOk { .. } => "auth_ok",
            Self::AuthFailed {} => "auth_failed",
            Self::Rules { .. } => "rules",
            Self::Timers { .. } => "timers",
            Self::Msg { .. } => "msg",
        }
    }
}

/// Whether an inbound `type` string names a message kind the engine
/// implements. The router drops anything else with an "unimplemented
/// type" diagnostic rather than a decode error.
pub fn is_known_kind(kind: &str) -> bool {
    matches!(
        kind,
        "things"
            | "states"
            | "views"
            | "last_seen"
            | "edit_data"
            | "edit_ok"
            | "edit_save"
            | "cookie"
            | "auth_required"
            | "auth_ok"
            | "auth_failed"
            | "rules"
            | "timers"
            | "msg"
    )
}

// ── Outbound payloads ────────────────────────────────────────────────

/// Field values read back from the edit dialog on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingEditSave {
    #[serde(default)]
    pub id: Option<ThingId>,
    pub name: String,
    pub thing_type: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub vnode: Option<String>,
    pub visible: bool,
    pub views: Vec<Choice>,
}

/// Per-rule toggle request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleToggle {
    pub enabled: bool,
}

/// Timer create/update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSave {
    #[serde(default)]
    pub id: Option<i64>,
    pub schedule: String,
    pub enabled: bool,
    #[serde(default)]
    pub rule_id: Option<i64>,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ── ClientMessage ────────────────────────────────────────────────────

/// Outbound messages produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Command {
        id: ThingId,
        value: StateValue,
    },
    /// `id: None` requests a create-new edit session.
    CreateOrEdit {
        id: Option<ThingId>,
    },
    EditSave {
        editing: String,
        data: ThingEditSave,
    },
    Authenticate {
        username: String,
        password: String,
    },
    /// Last-seen poll request. Sent immediately on (re)connect and every
    /// 30s while connected.
    LastSeen {},
    Rules {
        data: IndexMap<String, RuleToggle>,
    },
    Timer {
        data: TimerSave,
    },
    GetTimers {},
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn things_snapshot_decodes() {
        let raw = r#"{"type":"things","things":[{"id":1,"type":"switch","name":"Lamp","visible":true}]}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::Things { things } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].id, 1);
        assert_eq!(things[0].thing_type, "switch");
        assert_eq!(things[0].name, "Lamp");
        assert!(things[0].visible);
        assert_eq!(things[0].ordering, 0);
        assert!(things[0].views.is_empty());
    }

    #[test]
    fn state_report_collapses_to_single_variant() {
        let raw = r#"{"type":"states","states":[{"thing_id":1,"status_bool":true}]}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::States { states } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(states[0].value(), Some(StateValue::Bool(true)));

        let report = StateReport {
            thing_id: 2,
            status_bool: None,
            status_float: Some(21.5),
            status_str: None,
        };
        assert_eq!(report.value(), Some(StateValue::Float(21.5)));

        let empty = StateReport {
            thing_id: 3,
            status_bool: None,
            status_float: None,
            status_str: None,
        };
        assert_eq!(empty.value(), None);
    }

    #[test]
    fn views_preserve_message_order() {
        let raw = r#"{"type":"views","views":{"garden":[3,1],"attic":[2]}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::Views { views } = msg else {
            panic!("wrong variant");
        };
        let names: Vec<&String> = views.keys().collect();
        assert_eq!(names, ["garden", "attic"]);
        assert_eq!(views["garden"], vec![3, 1]);
    }

    #[test]
    fn last_seen_accepts_null_timestamps() {
        let raw = r#"{"type":"last_seen","last_seen":{"1":"2026-02-10T12:00:00Z","2":null}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::LastSeen { last_seen } = msg else {
            panic!("wrong variant");
        };
        assert!(last_seen["1"].is_some());
        assert!(last_seen["2"].is_none());
    }

    #[test]
    fn command_serializes_to_wire_form() {
        let msg = ClientMessage::Command {
            id: 1,
            value: StateValue::Bool(false),
        };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"command","id":1,"value":false}"#
        );
    }

    #[test]
    fn create_or_edit_carries_null_for_new() {
        let msg = ClientMessage::CreateOrEdit { id: None };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"create_or_edit","id":null}"#
        );
    }

    #[test]
    fn rules_toggle_wire_form() {
        let mut data = IndexMap::new();
        data.insert("night-mode".to_owned(), RuleToggle { enabled: true });
        let msg = ClientMessage::Rules { data };
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"rules","data":{"night-mode":{"enabled":true}}}"#
        );
    }

    #[test]
    fn unknown_kind_is_reported_unknown() {
        assert!(!is_known_kind("telemetry"));
        assert!(is_known_kind("things"));
        assert!(is_known_kind("msg"));
    }

    #[test]
    fn msg_accepts_short_field_alias() {
        let raw = r#"{"type":"msg","msg":"watering started"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let ServerMessage::Msg { message } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(message, "watering started");
    }

    #[test]
    fn kind_matches_wire_tag() {
        let raw = r#"{"type":"auth_ok","level":"admin"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind(), "auth_ok");
    }
}
