// src/services/debounce.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::utils::clock::Clock;

// Prune stale entries once the map grows past this many users.
const PRUNE_THRESHOLD: usize = 1024;

/// Drops repeated interactions from one user inside a short window.
///
/// The first event opens the window; events inside it are dropped and do not
/// extend it.
pub struct Debouncer {
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
    last_seen: DashMap<String, DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero()),
            clock,
            last_seen: DashMap::new(),
        }
    }

    /// Returns `true` if this event should be dropped.
    pub fn should_drop(&self, user_id: &str) -> bool {
        let now = self.clock.now();

        // The entry holds the shard lock until the window is decided.
        match self.last_seen.entry(user_id.to_string()) {
            Entry::Occupied(last) if now - *last.get() < self.window => return true,
            Entry::Occupied(mut last) => {
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }

        if self.last_seen.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }
        false
    }

    pub fn forget(&self, user_id: &str) {
        self.last_seen.remove(user_id);
    }

    fn prune(&self, now: DateTime<Utc>) {
        let window = self.window;
        self.last_seen.retain(|_, last| now - *last < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use chrono::TimeZone;

    fn debouncer() -> (Debouncer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ));
        (
            Debouncer::new(Duration::from_millis(800), clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_second_event_inside_window_is_dropped() {
        let (debouncer, clock) = debouncer();
        assert!(!debouncer.should_drop("u"));
        clock.advance(Duration::from_millis(799));
        assert!(debouncer.should_drop("u"));
    }

    #[test]
    fn test_event_at_window_edge_passes() {
        let (debouncer, clock) = debouncer();
        assert!(!debouncer.should_drop("u"));
        clock.advance(Duration::from_millis(800));
        assert!(!debouncer.should_drop("u"));
    }

    #[test]
    fn test_dropped_events_do_not_extend_window() {
        let (debouncer, clock) = debouncer();
        assert!(!debouncer.should_drop("u"));
        clock.advance(Duration::from_millis(500));
        assert!(debouncer.should_drop("u"));
        clock.advance(Duration::from_millis(300));
        assert!(!debouncer.should_drop("u"));
    }

    #[test]
    fn test_simultaneous_events_let_exactly_one_through() {
        let (debouncer, _clock) = debouncer();

        let passed = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| !debouncer.should_drop("u")))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|passed| *passed)
                .count()
        });

        assert_eq!(passed, 1);
    }

    #[test]
    fn test_users_are_independent() {
        let (debouncer, _clock) = debouncer();
        assert!(!debouncer.should_drop("a"));
        assert!(!debouncer.should_drop("b"));
        assert!(debouncer.should_drop("a"));
    }
}
