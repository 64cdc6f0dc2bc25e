//! A logging render sink.
//!
//! The headless binary has no widgets; every render effect becomes a
//! structured log line. Useful for watching a live server and as a
//! reference for real render-layer implementations.

use thingdash_core::{Dialog, DialogId, EntityKind, RenderSink, Staleness, StateValue, ThingId};

#[derive(Debug, Default)]
pub struct LogRender {
    fragment: Option<String>,
}

impl RenderSink for LogRender {
    fn create_display(&mut self, id: ThingId, kind: EntityKind, name: &str, visible: bool) {
        tracing::info!(id, ?kind, name, visible, "display created");
    }

    fn update_name(&mut self, id: ThingId, name: &str) {
        tracing::info!(id, name, "name updated");
    }

    fn update_value(&mut self, id: ThingId, value: &StateValue) {
        tracing::info!(id, ?value, "value");
    }

    fn set_pending(&mut self, id: ThingId, pending: bool) {
        tracing::debug!(id, pending, "pending marker");
    }

    fn set_visible(&mut self, id: ThingId, visible: bool) {
        tracing::debug!(id, visible, "visibility");
    }

    fn set_staleness(&mut self, id: ThingId, staleness: Staleness, label: Option<&str>) {
        tracing::debug!(id, ?staleness, label, "staleness");
    }

    fn current_fragment(&self) -> Option<String> {
        self.fragment.clone()
    }

    fn set_fragment(&mut self, view: &str) {
        self.fragment = Some(view.to_owned());
    }

    fn set_active_nav(&mut self, view: &str) {
        tracing::info!(view, "active view");
    }

    fn attach_dialog(&mut self, dialog: &Dialog) {
        tracing::info!(id = dialog.id.0, kind = ?dialog.kind, "dialog opened");
    }

    fn populate_dialog(&mut self, dialog: &Dialog) {
        tracing::debug!(id = dialog.id.0, kind = ?dialog.kind, "dialog populated");
    }

    fn detach_dialog(&mut self, id: DialogId) {
        tracing::info!(id = id.0, "dialog closed");
    }

    fn update_countdown(&mut self, key: &str, text: &str) {
        tracing::debug!(key, text, "countdown");
    }

    fn notify(&mut self, message: &str) {
        tracing::info!(message, "notification");
    }

    fn set_cookie(&mut self, name: &str, _value: &str, max_age: Option<i64>) {
        // Value withheld from logs; it is a session credential.
        tracing::debug!(name, max_age, "cookie received");
    }

    fn set_connected(&mut self, connected: bool) {
        tracing::info!(connected, "connection state");
    }
}
