//! The narrow interface between the engine and the rendering collaborator.
//!
//! Everything visual (widget templating, icons, CSS, tooltips, form
//! layout) lives behind this trait. The engine addresses entities by id
//! only and never holds render-layer objects.

use std::collections::{HashMap, HashSet};

use thingdash_link::message::{StateValue, ThingId};

use crate::dialog::{Dialog, DialogData, DialogId, DialogKind};
use crate::model::{EntityKind, Staleness};

/// Rendering collaborator interface.
pub trait RenderSink {
    /// Materialize a display binding for a newly registered entity.
    fn create_display(&mut self, id: ThingId, kind: EntityKind, name: &str, visible: bool);
    fn update_name(&mut self, id: ThingId, name: &str);
    /// Paint a confirmed (or reverted) value.
    fn update_value(&mut self, id: ThingId, value: &StateValue);
    /// Set or clear the optimistic "pending" marker.
    fn set_pending(&mut self, id: ThingId, pending: bool);
    fn set_visible(&mut self, id: ThingId, visible: bool);
    /// Advisory staleness classification with an optional diagnostic label
    /// (e.g. "Last seen 5 minutes ago").
    fn set_staleness(&mut self, id: ThingId, staleness: Staleness, label: Option<&str>);

    /// The view name currently encoded in the location fragment, if any.
    fn current_fragment(&self) -> Option<String>;
    fn set_fragment(&mut self, view: &str);
    /// Move the "active" highlight to exactly one navigation element.
    fn set_active_nav(&mut self, view: &str);

    fn attach_dialog(&mut self, dialog: &Dialog);
    fn populate_dialog(&mut self, dialog: &Dialog);
    fn detach_dialog(&mut self, id: DialogId);

    fn update_countdown(&mut self, key: &str, text: &str);

    /// Surface a user-facing notification (the flash bar).
    fn notify(&mut self, message: &str);
    fn set_cookie(&mut self, name: &str, value: &str, max_age: Option<i64>);
    fn set_connected(&mut self, connected: bool);
}

// ── Recording sink ───────────────────────────────────────────────────

/// A [`RenderSink`] that records what the engine asked of it. Reference
/// collaborator for tests: exposes the *current* rendered state rather
/// than the call sequence, which is what the engine's contracts are
/// phrased in.
#[derive(Debug, Default)]
pub struct RecordingRender {
    pub displays: HashMap<ThingId, EntityKind>,
    pub names: HashMap<ThingId, String>,
    pub values: HashMap<ThingId, StateValue>,
    pub pending: HashMap<ThingId, bool>,
    pub visible: HashMap<ThingId, bool>,
    pub staleness: HashMap<ThingId, (Staleness, Option<String>)>,
    pub fragment: Option<String>,
    pub active_nav: Option<String>,
    pub attached: HashSet<DialogId>,
    pub attach_calls: usize,
    pub populated: Vec<(DialogId, DialogKind)>,
    pub last_populated_data: Option<DialogData>,
    pub countdowns: HashMap<String, String>,
    pub notifications: Vec<String>,
    pub cookies: Vec<(String, String, Option<i64>)>,
    pub connected: Option<bool>,
}

impl RecordingRender {
    /// Rendered value for an entity, if any.
    pub fn value(&self, id: ThingId) -> Option<&StateValue> {
        self.values.get(&id)
    }

    pub fn is_pending(&self, id: ThingId) -> bool {
        self.pending.get(&id).copied().unwrap_or(false)
    }

    pub fn is_visible(&self, id: ThingId) -> bool {
        self.visible.get(&id).copied().unwrap_or(false)
    }
}

impl RenderSink for RecordingRender {
    fn create_display(&mut self, id: ThingId, kind: EntityKind, name: &str, visible: bool) {
        self.displays.insert(id, kind);
        self.names.insert(id, name.to_owned());
        self.visible.insert(id, visible);
    }

    fn update_name(&mut self, id: ThingId, name: &str) {
        self.names.insert(id, name.to_owned());
    }

    fn update_value(&mut self, id: ThingId, value: &StateValue) {
        self.values.insert(id, value.clone());
    }

    fn set_pending(&mut self, id: ThingId, pending: bool) {
        self.pending.insert(id, pending);
    }

    fn set_visible(&mut self, id: ThingId, visible: bool) {
        self.visible.insert(id, visible);
    }

    fn set_staleness(&mut self, id: ThingId, staleness: Staleness, label: Option<&str>) {
        self.staleness
            .insert(id, (staleness, label.map(str::to_owned)));
    }

    fn current_fragment(&self) -> Option<String> {
        self.fragment.clone()
    }

    fn set_fragment(&mut self, view: &str) {
        self.fragment = Some(view.to_owned());
    }

    fn set_active_nav(&mut self, view: &str) {
        self.active_nav = Some(view.to_owned());
    }

    fn attach_dialog(&mut self, dialog: &Dialog) {
        self.attached.insert(dialog.id);
        self.attach_calls += 1;
    }

    fn populate_dialog(&mut self, dialog: &Dialog) {
        self.populated.push((dialog.id, dialog.kind));
        self.last_populated_data = Some(dialog.data.clone());
    }

    fn detach_dialog(&mut self, id: DialogId) {
        self.attached.remove(&id);
    }

    fn update_countdown(&mut self, key: &str, text: &str) {
        self.countdowns.insert(key.to_owned(), text.to_owned());
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_owned());
    }

    fn set_cookie(&mut self, name: &str, value: &str, max_age: Option<i64>) {
        self.cookies
            .push((name.to_owned(), value.to_owned(), max_age));
    }

    fn set_connected(&mut self, connected: bool) {
        self.connected = Some(connected);
    }
}
