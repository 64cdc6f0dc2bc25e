//! Remaining-time countdowns.
//!
//! Each scheduled timer with a known next firing gets a keyed countdown:
//! a once-per-second tick task that posts back onto the session event
//! channel, where the remaining time is formatted and pushed to the
//! render layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::session::SessionEvent;

#[derive(Debug)]
struct CountdownEntry {
    target: DateTime<Utc>,
    seq: u64,
    abort: AbortHandle,
}

/// Keyed registry of live countdowns.
#[derive(Debug)]
pub struct CountdownRegistry {
    entries: HashMap<String, CountdownEntry>,
    next_seq: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CountdownRegistry {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            events,
        }
    }

    /// Start (or restart) the countdown for `key` toward `target`.
    pub fn start(&mut self, key: &str, target: DateTime<Utc>) {
        if let Some(old) = self.entries.remove(key) {
            old.abort.abort();
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        let events = self.events.clone();
        let tick_key = key.to_owned();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
            loop {
                ticker.tick().await;
                if events
                    .send(SessionEvent::CountdownTick {
                        key: tick_key.clone(),
                        seq,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
        self.entries.insert(
            key.to_owned(),
            CountdownEntry {
                target,
                seq,
                abort: handle.abort_handle(),
            },
        );
    }

    /// Handle a tick. Stale ticks (replaced or stopped countdowns)
    /// return `None`; live ones return the display text.
    pub fn on_tick(&self, key: &str, seq: u64, now: DateTime<Utc>) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.seq != seq {
            return None;
        }
        let remaining = entry.target.signed_duration_since(now).num_seconds();
        Some(format_remaining(remaining))
    }

    pub fn stop(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            entry.abort.abort();
        }
    }

    /// Abort every live countdown. Used when the timers dialog closes.
    pub fn stop_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.abort.abort();
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Display text for a remaining duration in seconds.
///
/// A firing that is due or overdue shows as "pending" until the server
/// reschedules it.
pub fn format_remaining(secs: i64) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    if secs <= 0 {
        return "pending".to_owned();
    }
    if secs >= DAY {
        return format!("{}d", secs / DAY);
    }
    let hours = secs / HOUR;
    let minutes = (secs % HOUR) / MINUTE;
    let seconds = secs % MINUTE;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes}:{seconds:02}")
    } else {
        format!("{seconds}")
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_remaining_time_bands() {
        assert_eq!(format_remaining(-5), "pending");
        assert_eq!(format_remaining(0), "pending");
        assert_eq!(format_remaining(42), "42");
        assert_eq!(format_remaining(75), "1:15");
        assert_eq!(format_remaining(3600), "1:00:00");
        assert_eq!(format_remaining(3 * 3600 + 5 * 60 + 9), "3:05:09");
        assert_eq!(format_remaining(2 * 86_400 + 3600), "2d");
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_carry_key_and_seq() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reg = CountdownRegistry::new(tx);
        let now = Utc::now();
        reg.start("timer-1", now + TimeDelta::seconds(90));

        let SessionEvent::CountdownTick { key, seq } = rx.recv().await.unwrap() else {
            panic!("wrong event");
        };
        assert_eq!(key, "timer-1");
        assert_eq!(reg.on_tick(&key, seq, now).as_deref(), Some("1:30"));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_invalidates_old_seq() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reg = CountdownRegistry::new(tx);
        let now = Utc::now();
        reg.start("timer-1", now + TimeDelta::seconds(30));
        let SessionEvent::CountdownTick { seq: old_seq, .. } = rx.recv().await.unwrap() else {
            panic!("wrong event");
        };

        reg.start("timer-1", now + TimeDelta::seconds(300));
        assert_eq!(reg.on_tick("timer-1", old_seq, now), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_clears_registry() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut reg = CountdownRegistry::new(tx);
        let now = Utc::now();
        reg.start("timer-1", now);
        reg.start("timer-2", now);
        assert_eq!(reg.len(), 2);
        reg.stop_all();
        assert!(reg.is_empty());
        assert!(reg.on_tick("timer-1", 1, now).is_none());
    }
}
