//! Occurrence counting for repeated errors.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub const DEFAULT_WINDOW_SECS: i64 = 60 * 60;

/// Per-fingerprint state inside the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub count: u32,
    pub last_seen: DateTime<Utc>,
    pub alerted: bool,
}

/// Counts occurrences of each fingerprint. Entries not seen for longer than
/// the window are forgotten, which restarts their count and re-arms alerting.
#[derive(Debug)]
pub struct OccurrenceTracker {
    window: Duration,
    entries: HashMap<String, Occurrence>,
}

impl Default for OccurrenceTracker {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}

impl OccurrenceTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Record one occurrence at `now` and return the updated state.
    pub fn track(&mut self, fingerprint: &str, now: DateTime<Utc>) -> Occurrence {
        self.evict_expired(now);

        let occurrence = self
            .entries
            .entry(fingerprint.to_string())
            .and_modify(|o| {
                o.count += 1;
                o.last_seen = now;
            })
            .or_insert(Occurrence {
                count: 1,
                last_seen: now,
                alerted: false,
            });
        *occurrence
    }

    pub fn mark_alerted(&mut self, fingerprint: &str) {
        if let Some(o) = self.entries.get_mut(fingerprint) {
            o.alerted = true;
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<&Occurrence> {
        self.entries.get(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.entries.retain(|_, o| now - o.last_seen <= window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_counts_per_fingerprint() {
        let mut tracker = OccurrenceTracker::default();
        assert_eq!(tracker.track("a", t0()).count, 1);
        assert_eq!(tracker.track("a", t0()).count, 2);
        assert_eq!(tracker.track("b", t0()).count, 1);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_entries_expire_after_window() {
        let mut tracker = OccurrenceTracker::default();
        tracker.track("a", t0());
        tracker.track("a", t0());
        tracker.mark_alerted("a");

        // Exactly one window later is still inside it.
        let edge = t0() + Duration::hours(1);
        let o = tracker.track("a", edge);
        assert_eq!(o.count, 3);
        assert!(o.alerted);

        let later = edge + Duration::hours(1) + Duration::seconds(1);
        let o = tracker.track("a", later);
        assert_eq!(o.count, 1);
        assert!(!o.alerted);
    }

    #[test]
    fn test_eviction_sweeps_other_fingerprints() {
        let mut tracker = OccurrenceTracker::default();
        tracker.track("old", t0());
        tracker.track("new", t0() + Duration::minutes(90));
        assert!(tracker.get("old").is_none());
        assert_eq!(tracker.len(), 1);
    }
}
