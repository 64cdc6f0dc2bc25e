//! Session orchestration and message routing.
//!
//! One [`Session`] owns every stateful component. It is driven by a
//! single event channel: connection events and inbound frames arrive as
//! [`SessionEvent`]s, and the timers spawned by the command tracker and
//! the countdown registry post back onto the same channel. Each event is
//! handled to completion before the next, so no session state needs
//! locking.

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use thingdash_link::message::{
    is_known_kind, ClientMessage, RuleToggle, ServerMessage, StateValue, ThingEditSave, ThingId,
    TimerSave,
};

use crate::countdown::CountdownRegistry;
use crate::dialog::{DialogData, DialogId, DialogKind, DialogStack};
use crate::error::SessionError;
use crate::model::Capability;
use crate::pending::{CommandTracker, Elapsed};
use crate::render::RenderSink;
use crate::store::EntityStore;
use crate::views::{Activate, ViewIndex};

/// Everything that can drive the session. Connection events are bridged
/// in from the link; the other variants are posted by the session's own
/// timer tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LinkOpened,
    LinkClosed,
    /// One raw inbound frame.
    Frame(String),
    /// A pending-command timer fired.
    PendingElapsed { id: ThingId, seq: u64 },
    /// A countdown ticked.
    CountdownTick { key: String, seq: u64 },
}

/// The synchronization engine for one dashboard session.
pub struct Session<R: RenderSink> {
    store: EntityStore,
    pending: CommandTracker,
    views: ViewIndex,
    dialogs: DialogStack,
    countdowns: CountdownRegistry,
    render: R,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    auth_level: Option<String>,
}

impl<R: RenderSink> Session<R> {
    /// Build a session around a rendering collaborator and an outbound
    /// message channel. The returned receiver is the session's event
    /// inbox; the caller drives it.
    pub fn new(
        render: R,
        outbound: mpsc::UnboundedSender<ClientMessage>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            store: EntityStore::default(),
            pending: CommandTracker::new(events_tx.clone()),
            views: ViewIndex::default(),
            dialogs: DialogStack::default(),
            countdowns: CountdownRegistry::new(events_tx),
            render,
            outbound,
            auth_level: None,
        };
        (session, events_rx)
    }

    // ── Event loop entry ─────────────────────────────────────────────

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::LinkOpened => self.render.set_connected(true),
            SessionEvent::LinkClosed => self.render.set_connected(false),
            SessionEvent::Frame(text) => self.handle_frame(&text),
            SessionEvent::PendingElapsed { id, seq } => self.on_pending_elapsed(id, seq),
            SessionEvent::CountdownTick { key, seq } => {
                if let Some(text) = self.countdowns.on_tick(&key, seq, Utc::now()) {
                    self.render.update_countdown(&key, &text);
                }
            }
        }
    }

    /// Decode and dispatch one inbound frame.
    ///
    /// Two-step decode: the `type` discriminator is inspected first so
    /// that an unimplemented kind is logged as such rather than as a
    /// decode error. No inbound frame is ever fatal.
    pub fn handle_frame(&mut self, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "undecodable frame dropped");
                return;
            }
        };
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if !is_known_kind(&kind) {
            debug!(kind, "unimplemented message type dropped");
            return;
        }
        let msg: ServerMessage = match serde_json::from_value(value) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(kind, %err, "malformed payload dropped");
                return;
            }
        };
        let msg_kind = msg.kind();
        if let Err(err) = self.dispatch(msg) {
            warn!(kind = msg_kind, %err, "message handler failed");
        }
    }

    fn dispatch(&mut self, msg: ServerMessage) -> Result<(), SessionError> {
        match msg {
            ServerMessage::Things { things } => {
                for snapshot in &things {
                    self.store.upsert(snapshot, &self.views, &mut self.render);
                }
            }
            ServerMessage::States { states } => {
                for report in &states {
                    let id = report.thing_id;
                    if !self.store.display_gate(id) {
                        debug!(id, "state update for unknown or unsupported thing dropped");
                        continue;
                    }
                    let Some(value) = report.value() else {
                        continue;
                    };
                    // Settle before painting: confirmation must not race
                    // the rollback timer.
                    if self.pending.cancel(id) {
                        self.render.set_pending(id, false);
                    }
                    self.store.apply_confirmed(id, value.clone());
                    self.render.update_value(id, &value);
                }
            }
            ServerMessage::Views { views } => {
                let hint = self.render.current_fragment();
                let initial = self.views.replace_all(views, hint.as_deref());
                if let Some(name) = initial {
                    self.switch_view(&name);
                }
            }
            ServerMessage::LastSeen { last_seen } => {
                let now = Utc::now();
                for (key, seen) in &last_seen {
                    let Ok(id) = key.parse::<ThingId>() else {
                        debug!(key, "non-numeric last_seen key skipped");
                        continue;
                    };
                    self.store.apply_last_seen(id, *seen, now, &mut self.render);
                }
            }
            ServerMessage::EditData { kind, data } => {
                if kind != "thing" {
                    return Err(SessionError::UnknownEditKind(kind));
                }
                let data = DialogData::ThingEdit(data);
                match self.dialogs.find_topmost_of_kind(DialogKind::ThingEdit) {
                    Some(dialog) => {
                        let id = dialog.id;
                        self.dialogs.repopulate(id, data, &mut self.render);
                    }
                    None => {
                        self.dialogs.open(data, &mut self.render);
                    }
                }
            }
            ServerMessage::EditOk {} | ServerMessage::EditSave {} => {
                self.dialogs
                    .close_topmost_of_kind(DialogKind::ThingEdit, &mut self.render);
            }
            ServerMessage::Cookie {
                name,
                value,
                max_age,
            } => {
                self.render.set_cookie(&name, &value, max_age);
            }
            ServerMessage::AuthRequired {} => {
                if self.dialogs.find_topmost_of_kind(DialogKind::Login).is_none() {
                    self.dialogs.open(DialogData::Login, &mut self.render);
                }
            }
            ServerMessage::AuthOk { level } => {
                self.auth_level = level;
                self.dialogs
                    .close_topmost_of_kind(DialogKind::Login, &mut self.render);
            }
            ServerMessage::AuthFailed {} => {
                self.render.notify("Authentication failed");
            }
            ServerMessage::Rules { rules } => {
                match self.dialogs.find_topmost_of_kind(DialogKind::Rules) {
                    Some(dialog) => {
                        let id = dialog.id;
                        self.dialogs
                            .repopulate(id, DialogData::Rules(rules), &mut self.render);
                    }
                    None => debug!("rules update with no rules dialog open"),
                }
            }
            ServerMessage::Timers { timers, rules } => {
                match self.dialogs.find_topmost_of_kind(DialogKind::Timers) {
                    Some(dialog) => {
                        let id = dialog.id;
                        self.countdowns.stop_all();
                        for timer in &timers {
                            if let (Some(timer_id), Some(next_fire)) = (timer.id, timer.next_fire) {
                                self.countdowns.start(&format!("timer-{timer_id}"), next_fire);
                            }
                        }
                        self.dialogs.repopulate(
                            id,
                            DialogData::Timers { timers, rules },
                            &mut self.render,
                        );
                    }
                    None => debug!("timers update with no timers dialog open"),
                }
            }
            ServerMessage::Msg { message } => {
                self.render.notify(&message);
            }
        }
        Ok(())
    }

    fn on_pending_elapsed(&mut self, id: ThingId, seq: u64) {
        match self.pending.on_elapsed(id, seq) {
            Some(Elapsed::SendCoalesced { value }) => {
                self.send(ClientMessage::Command { id, value });
            }
            Some(Elapsed::Rollback { prior }) => {
                debug!(id, "command unconfirmed, reverting display");
                if let Some(prior) = prior {
                    self.render.update_value(id, &prior);
                }
                self.render.set_pending(id, false);
            }
            None => {}
        }
    }

    // ── User operations ──────────────────────────────────────────────

    /// Optimistic toggle: paint the target, send the command now, arm
    /// the rollback timer.
    pub fn issue_toggle(&mut self, id: ThingId, on: bool) {
        let Some(entity) = self.store.get(id) else {
            return;
        };
        if entity.kind.map(|k| k.capability()) != Some(Capability::Toggle) {
            debug!(id, "toggle on a non-toggle thing ignored");
            return;
        }
        let prior = entity.last_confirmed.clone();
        let value = StateValue::Bool(on);
        self.render.update_value(id, &value);
        self.render.set_pending(id, true);
        self.send(ClientMessage::Command {
            id,
            value: value.clone(),
        });
        self.pending.begin_toggle(id, value, prior);
    }

    /// One increment step on a numeric setpoint. Nothing is sent yet:
    /// steps within the quiet period coalesce into a single command.
    pub fn issue_increment(&mut self, id: ThingId, delta: f64) {
        let Some(entity) = self.store.get(id) else {
            return;
        };
        if entity.kind.map(|k| k.capability()) != Some(Capability::Reading) {
            debug!(id, "increment on a non-numeric thing ignored");
            return;
        }
        let prior = entity.last_confirmed.clone();
        let base = match self.pending.pending_value(id).or(prior.as_ref()) {
            Some(StateValue::Float(current)) => *current,
            _ => 0.0,
        };
        let value = StateValue::Float(base + delta);
        self.render.update_value(id, &value);
        self.render.set_pending(id, true);
        self.pending.begin_increment(id, value, prior);
    }

    /// Activate a view: update the fragment, recompute every entity's
    /// visibility, move the navigation highlight.
    pub fn switch_view(&mut self, name: &str) {
        match self.views.activate(name) {
            Activate::Unknown => {
                warn!(view = name, "unknown view requested");
                return;
            }
            Activate::AlreadyActive => return,
            Activate::Switched => {}
        }
        self.render.set_fragment(name);
        for id in self.store.ids().collect::<Vec<_>>() {
            let Some(entity) = self.store.get(id) else {
                continue;
            };
            if entity.has_display {
                let visible = entity.visible && self.views.is_member(name, id);
                self.render.set_visible(id, visible);
            }
        }
        self.render.set_active_nav(name);
    }

    /// Request edit data for an existing thing, or a create-new session
    /// when `id` is `None`. The dialog opens when `edit_data` arrives.
    pub fn request_edit(&mut self, id: Option<ThingId>) {
        self.send(ClientMessage::CreateOrEdit { id });
    }

    /// Submit the edit dialog's fields. The dialog closes on the
    /// server's ack.
    pub fn save_edit(&mut self, data: ThingEditSave) {
        self.send(ClientMessage::EditSave {
            editing: "thing".to_owned(),
            data,
        });
    }

    pub fn login(&mut self, username: &str, password: &str) {
        self.send(ClientMessage::Authenticate {
            username: username.to_owned(),
            password: password.to_owned(),
        });
    }

    /// Open the rules dialog; contents arrive via `rules` messages.
    /// A dialog kind is unique among open dialogs: an already-open rules
    /// dialog is reused instead of stacked.
    pub fn open_rules(&mut self) -> DialogId {
        if let Some(dialog) = self.dialogs.find_topmost_of_kind(DialogKind::Rules) {
            return dialog.id;
        }
        self.dialogs.open(DialogData::Rules(Vec::new()), &mut self.render)
    }

    pub fn toggle_rule(&mut self, name: &str, enabled: bool) {
        let mut data = IndexMap::new();
        data.insert(name.to_owned(), RuleToggle { enabled });
        self.send(ClientMessage::Rules { data });
    }

    /// Open the timers dialog and request the current timer list. An
    /// already-open timers dialog is reused; the request still goes out
    /// so the contents refresh.
    pub fn open_timers(&mut self) -> DialogId {
        let id = match self.dialogs.find_topmost_of_kind(DialogKind::Timers) {
            Some(dialog) => dialog.id,
            None => self.dialogs.open(
                DialogData::Timers {
                    timers: Vec::new(),
                    rules: Vec::new(),
                },
                &mut self.render,
            ),
        };
        self.send(ClientMessage::GetTimers {});
        id
    }

    pub fn save_timer(&mut self, data: TimerSave) {
        self.send(ClientMessage::Timer { data });
    }

    /// Close a dialog. Closing the timers dialog stops its countdowns.
    pub fn close_dialog(&mut self, id: DialogId) {
        if self.dialogs.close(id, &mut self.render) == Some(DialogKind::Timers) {
            self.countdowns.stop_all();
        }
    }

    /// Close the topmost dialog of a kind, for render-layer close
    /// buttons that know the kind but not the id.
    pub fn close_topmost_of_kind(&mut self, kind: DialogKind) -> Option<DialogId> {
        let id = self.dialogs.close_topmost_of_kind(kind, &mut self.render)?;
        if kind == DialogKind::Timers {
            self.countdowns.stop_all();
        }
        Some(id)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn render(&self) -> &R {
        &self.render
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn auth_level(&self) -> Option<&str> {
        self.auth_level.as_deref()
    }

    fn send(&self, msg: ClientMessage) {
        if self.outbound.send(msg).is_err() {
            debug!("outbound channel closed, message dropped");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
