//! Modal dialog stack.
//!
//! Dialogs open in LIFO order. The engine tracks which dialogs are open
//! and what data they were last populated with; the render layer owns
//! their widgets.

use std::collections::HashSet;

use tracing::warn;

use thingdash_link::message::{RuleState, ThingEditData, TimerDescriptor};

use crate::render::RenderSink;

/// Engine-assigned dialog handle, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DialogId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Login,
    ThingEdit,
    Rules,
    Timers,
}

/// Current contents of a dialog, replaced wholesale on repopulation.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogData {
    Login,
    ThingEdit(ThingEditData),
    Rules(Vec<RuleState>),
    Timers {
        timers: Vec<TimerDescriptor>,
        rules: Vec<String>,
    },
}

impl DialogData {
    pub fn kind(&self) -> DialogKind {
        match self {
            Self::Login => DialogKind::Login,
            Self::ThingEdit(_) => DialogKind::ThingEdit,
            Self::Rules(_) => DialogKind::Rules,
            Self::Timers { .. } => DialogKind::Timers,
        }
    }
}

#[derive(Debug)]
pub struct Dialog {
    pub id: DialogId,
    pub kind: DialogKind,
    pub data: DialogData,
}

/// LIFO registry of open dialogs.
#[derive(Debug, Default)]
pub struct DialogStack {
    stack: Vec<Dialog>,
    attached: HashSet<DialogId>,
    next_id: u64,
}

impl DialogStack {
    /// Push a dialog, attach it to the render layer (once per id) and
    /// populate it.
    pub fn open<R: RenderSink>(&mut self, data: DialogData, render: &mut R) -> DialogId {
        self.next_id += 1;
        let dialog = Dialog {
            id: DialogId(self.next_id),
            kind: data.kind(),
            data,
        };
        if self.attached.insert(dialog.id) {
            render.attach_dialog(&dialog);
        }
        render.populate_dialog(&dialog);
        let id = dialog.id;
        self.stack.push(dialog);
        id
    }

    /// Replace a dialog's data and repopulate it in the render layer.
    pub fn repopulate<R: RenderSink>(
        &mut self,
        id: DialogId,
        data: DialogData,
        render: &mut R,
    ) -> bool {
        let Some(dialog) = self.stack.iter_mut().find(|d| d.id == id) else {
            return false;
        };
        dialog.data = data;
        render.populate_dialog(dialog);
        true
    }

    /// Close a dialog by id. Out-of-order closes work but are flagged,
    /// since user flows close the topmost dialog.
    pub fn close<R: RenderSink>(&mut self, id: DialogId, render: &mut R) -> Option<DialogKind> {
        let pos = self.stack.iter().position(|d| d.id == id)?;
        if pos != self.stack.len() - 1 {
            warn!(id = id.0, "closing a dialog that is not topmost");
        }
        let dialog = self.stack.remove(pos);
        self.attached.remove(&dialog.id);
        render.detach_dialog(dialog.id);
        Some(dialog.kind)
    }

    /// Close the topmost dialog of the given kind, if any. Used for
    /// server-driven closes (auth success, edit acks) where dialogs of
    /// other kinds may sit above it.
    pub fn close_topmost_of_kind<R: RenderSink>(
        &mut self,
        kind: DialogKind,
        render: &mut R,
    ) -> Option<DialogId> {
        let pos = self.stack.iter().rposition(|d| d.kind == kind)?;
        let dialog = self.stack.remove(pos);
        self.attached.remove(&dialog.id);
        render.detach_dialog(dialog.id);
        Some(dialog.id)
    }

    /// Topmost open dialog of the given kind.
    pub fn find_topmost_of_kind(&self, kind: DialogKind) -> Option<&Dialog> {
        self.stack.iter().rev().find(|d| d.kind == kind)
    }

    pub fn topmost(&self) -> Option<&Dialog> {
        self.stack.last()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingRender;
    use pretty_assertions::assert_eq;

    #[test]
    fn open_attaches_once_and_populates() {
        let mut stack = DialogStack::default();
        let mut render = RecordingRender::default();

        let id = stack.open(DialogData::Login, &mut render);
        assert!(render.attached.contains(&id));
        assert_eq!(render.attach_calls, 1);
        assert_eq!(render.populated, vec![(id, DialogKind::Login)]);
    }

    #[test]
    fn lifo_order_with_interleaved_kinds() {
        let mut stack = DialogStack::default();
        let mut render = RecordingRender::default();

        let rules = stack.open(DialogData::Rules(Vec::new()), &mut render);
        let login = stack.open(DialogData::Login, &mut render);
        assert_eq!(stack.topmost().map(|d| d.id), Some(login));

        // Server-driven close targets the login dialog even while it is
        // above the rules dialog.
        assert_eq!(
            stack.close_topmost_of_kind(DialogKind::Login, &mut render),
            Some(login)
        );
        assert_eq!(stack.topmost().map(|d| d.id), Some(rules));
        assert!(!render.attached.contains(&login));
        assert!(render.attached.contains(&rules));

        // A second close of the same kind finds nothing and leaves the
        // remaining stack untouched.
        assert_eq!(
            stack.close_topmost_of_kind(DialogKind::Login, &mut render),
            None
        );
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.topmost().map(|d| d.id), Some(rules));
        assert!(render.attached.contains(&rules));
    }

    #[test]
    fn close_missing_kind_is_a_no_op() {
        let mut stack = DialogStack::default();
        let mut render = RecordingRender::default();
        assert_eq!(
            stack.close_topmost_of_kind(DialogKind::Timers, &mut render),
            None
        );
    }

    #[test]
    fn repopulate_replaces_data_wholesale() {
        let mut stack = DialogStack::default();
        let mut render = RecordingRender::default();

        let id = stack.open(DialogData::Rules(Vec::new()), &mut render);
        let updated = vec![RuleState {
            name: "night-mode".to_owned(),
            state: true,
        }];
        assert!(stack.repopulate(id, DialogData::Rules(updated.clone()), &mut render));
        assert_eq!(render.last_populated_data, Some(DialogData::Rules(updated)));
        // One attach, two populates.
        assert_eq!(render.attach_calls, 1);
        assert_eq!(render.populated.len(), 2);
    }

    #[test]
    fn out_of_order_close_still_removes() {
        let mut stack = DialogStack::default();
        let mut render = RecordingRender::default();

        let lower = stack.open(DialogData::Rules(Vec::new()), &mut render);
        let upper = stack.open(DialogData::Login, &mut render);

        assert_eq!(stack.close(lower, &mut render), Some(DialogKind::Rules));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.topmost().map(|d| d.id), Some(upper));
    }

    #[test]
    fn ids_are_unique_per_session() {
        let mut stack = DialogStack::default();
        let mut render = RecordingRender::default();
        let a = stack.open(DialogData::Login, &mut render);
        stack.close(a, &mut render);
        let b = stack.open(DialogData::Login, &mut render);
        assert_ne!(a, b);
    }
}
