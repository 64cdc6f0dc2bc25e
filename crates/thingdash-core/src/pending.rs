//! Optimistic command tracking.
//!
//! At most one in-flight command per entity. Toggles are sent
//! immediately and armed with a rollback timer; increments are debounced
//! and coalesced first, then armed with a longer confirmation window.
//! Timers are spawned tasks that post back onto the session event
//! channel; a per-command sequence number makes stale firings
//! recognizable after cancel-before-replace.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

use thingdash_link::message::{StateValue, ThingId};

use crate::session::SessionEvent;

/// Rollback window for a toggle awaiting confirmation.
pub const TOGGLE_ROLLBACK: Duration = Duration::from_secs(1);
/// Quiet period before a burst of increments is sent as one command.
pub const INCREMENT_DEBOUNCE: Duration = Duration::from_millis(500);
/// Confirmation window for a sent increment command.
pub const INCREMENT_CONFIRM: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Coalescing increments; nothing sent yet.
    Debounce,
    /// Command sent; rollback on expiry.
    AwaitConfirm,
}

#[derive(Debug)]
struct PendingCommand {
    phase: Phase,
    /// Optimistically displayed target value.
    value: StateValue,
    /// Rollback target: the last confirmed value before the first
    /// optimistic step. Survives coalescing replacements.
    prior: Option<StateValue>,
    seq: u64,
    abort: AbortHandle,
}

/// What the session must do when a pending-command timer fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Elapsed {
    /// Debounce expired: send the coalesced value as one command.
    SendCoalesced { value: StateValue },
    /// Confirmation window expired: revert the display.
    Rollback { prior: Option<StateValue> },
}

/// Per-entity in-flight command registry.
#[derive(Debug)]
pub struct CommandTracker {
    pending: HashMap<ThingId, PendingCommand>,
    next_seq: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CommandTracker {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            pending: HashMap::new(),
            next_seq: 0,
            events,
        }
    }

    fn arm(&mut self, id: ThingId, after: Duration) -> (u64, AbortHandle) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // Receiver gone means the session is shutting down.
            let _ = events.send(SessionEvent::PendingElapsed { id, seq });
        });
        (seq, handle.abort_handle())
    }

    /// Track a toggle that the caller has already sent. Replaces any
    /// prior in-flight command for the entity.
    pub fn begin_toggle(&mut self, id: ThingId, value: StateValue, prior: Option<StateValue>) {
        if let Some(old) = self.pending.remove(&id) {
            old.abort.abort();
        }
        let (seq, abort) = self.arm(id, TOGGLE_ROLLBACK);
        self.pending.insert(
            id,
            PendingCommand {
                phase: Phase::AwaitConfirm,
                value,
                prior,
                seq,
                abort,
            },
        );
    }

    /// Track one increment step. Nothing is sent yet: the debounce timer
    /// restarts on every step and the target value is replaced, while the
    /// rollback target of the first step is preserved.
    pub fn begin_increment(&mut self, id: ThingId, value: StateValue, prior: Option<StateValue>) {
        let prior = match self.pending.remove(&id) {
            Some(old) => {
                old.abort.abort();
                old.prior
            }
            None => prior,
        };
        let (seq, abort) = self.arm(id, INCREMENT_DEBOUNCE);
        self.pending.insert(
            id,
            PendingCommand {
                phase: Phase::Debounce,
                value,
                prior,
                seq,
                abort,
            },
        );
    }

    /// Settle the in-flight command for `id`, aborting its timer.
    /// Returns whether one existed.
    pub fn cancel(&mut self, id: ThingId) -> bool {
        match self.pending.remove(&id) {
            Some(cmd) => {
                cmd.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Handle a timer firing. Stale firings (sequence mismatch or no
    /// entry left) return `None`.
    pub fn on_elapsed(&mut self, id: ThingId, seq: u64) -> Option<Elapsed> {
        let cmd = self.pending.get(&id)?;
        if cmd.seq != seq {
            trace!(id, seq, current = cmd.seq, "stale pending timer ignored");
            return None;
        }
        match cmd.phase {
            Phase::Debounce => {
                // Quiet period over: promote to a sent command.
                let value = cmd.value.clone();
                let (new_seq, abort) = self.arm(id, INCREMENT_CONFIRM);
                let cmd = self.pending.get_mut(&id)?;
                cmd.phase = Phase::AwaitConfirm;
                cmd.seq = new_seq;
                cmd.abort = abort;
                Some(Elapsed::SendCoalesced { value })
            }
            Phase::AwaitConfirm => {
                let cmd = self.pending.remove(&id)?;
                Some(Elapsed::Rollback { prior: cmd.prior })
            }
        }
    }

    pub fn is_pending(&self, id: ThingId) -> bool {
        self.pending.contains_key(&id)
    }

    /// The optimistically displayed target of the in-flight command,
    /// the stepping base for further increments.
    pub fn pending_value(&self, id: ThingId) -> Option<&StateValue> {
        self.pending.get(&id).map(|cmd| &cmd.value)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracker() -> (CommandTracker, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CommandTracker::new(tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_times_out_into_rollback() {
        let (mut tracker, mut rx) = tracker();
        tracker.begin_toggle(1, StateValue::Bool(false), Some(StateValue::Bool(true)));
        assert!(tracker.is_pending(1));

        let SessionEvent::PendingElapsed { id, seq } = rx.recv().await.unwrap() else {
            panic!("wrong event");
        };
        assert_eq!(id, 1);
        assert_eq!(
            tracker.on_elapsed(id, seq),
            Some(Elapsed::Rollback {
                prior: Some(StateValue::Bool(true))
            })
        );
        assert!(!tracker.is_pending(1));
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_cancels_rollback_timer() {
        let (mut tracker, mut rx) = tracker();
        tracker.begin_toggle(1, StateValue::Bool(false), Some(StateValue::Bool(true)));
        assert!(tracker.cancel(1));

        tokio::time::sleep(TOGGLE_ROLLBACK * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_firing_after_replacement_is_ignored() {
        let (mut tracker, mut rx) = tracker();
        tracker.begin_toggle(1, StateValue::Bool(false), Some(StateValue::Bool(true)));
        let stale_seq = 1;
        // Replace before the first timer fires.
        tracker.begin_toggle(1, StateValue::Bool(true), Some(StateValue::Bool(true)));

        assert_eq!(tracker.on_elapsed(1, stale_seq), None);
        assert!(tracker.is_pending(1));

        let SessionEvent::PendingElapsed { seq, .. } = rx.recv().await.unwrap() else {
            panic!("wrong event");
        };
        assert!(tracker.on_elapsed(1, seq).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn increments_coalesce_and_keep_first_prior() {
        let (mut tracker, mut rx) = tracker();
        tracker.begin_increment(1, StateValue::Float(21.5), Some(StateValue::Float(21.0)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        tracker.begin_increment(1, StateValue::Float(22.0), Some(StateValue::Float(21.5)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        tracker.begin_increment(1, StateValue::Float(22.5), Some(StateValue::Float(22.0)));

        // Only the last debounce timer is live.
        let SessionEvent::PendingElapsed { seq, .. } = rx.recv().await.unwrap() else {
            panic!("wrong event");
        };
        assert_eq!(
            tracker.on_elapsed(1, seq),
            Some(Elapsed::SendCoalesced {
                value: StateValue::Float(22.5)
            })
        );
        assert!(tracker.is_pending(1));

        // No confirmation: rollback to the value before the burst.
        let SessionEvent::PendingElapsed { seq, .. } = rx.recv().await.unwrap() else {
            panic!("wrong event");
        };
        assert_eq!(
            tracker.on_elapsed(1, seq),
            Some(Elapsed::Rollback {
                prior: Some(StateValue::Float(21.0))
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_pending_reports_false() {
        let (mut tracker, _rx) = tracker();
        assert!(!tracker.cancel(5));
    }
}
