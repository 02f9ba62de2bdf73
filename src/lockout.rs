// src/lockout.rs
// Cross-node replay ("teleportation") detection (spec.md §4.5).
//
// Grounded on the teacher's `fraud_detection::FraudDetector` — a per-key
// tracker with a time window — adapted from a counting threshold to a
// two-event, two-node equality check.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct LockoutEntry {
    last_ts: NaiveDateTime,
    last_node_id: String,
}

pub struct LockoutEngine {
    window: ChronoDuration,
    entries: Mutex<HashMap<String, LockoutEntry>>,
}

/// Result of evaluating one affirmative decision against the lockout table.
pub enum LockoutCheck {
    /// No conflicting recent use; the table has been updated.
    Clear,
    /// Cross-node reuse within the window; the uid must be revoked.
    Triggered,
}

impl LockoutEngine {
    pub fn new(window: ChronoDuration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate and update the table for an affirmative decision at
    /// `(uid, node_id, ts)`. Must be called for every affirmative outcome,
    /// regardless of whether the affirmation came directly from the node or
    /// from a local override (spec.md §4.5, §9 resolved asymmetry).
    pub fn check_and_update(&self, uid: &str, node_id: &str, ts: NaiveDateTime) -> LockoutCheck {
        let mut entries = self.entries.lock();

        if let Some(prev) = entries.get(uid) {
            let delta = ts - prev.last_ts;
            if delta < self.window && prev.last_node_id != node_id {
                // Do not update the table on trigger: the uid is about to
                // be revoked from the allow-list entirely.
                return LockoutCheck::Triggered;
            }
        }

        entries.insert(
            uid.to_string(),
            LockoutEntry {
                last_ts: ts,
                last_node_id: node_id.to_string(),
            },
        );
        LockoutCheck::Clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn first_use_is_always_clear() {
        let engine = LockoutEngine::new(ChronoDuration::seconds(10));
        assert!(matches!(
            engine.check_and_update("U1", "N1", ts("2024-05-30 12:00:00")),
            LockoutCheck::Clear
        ));
    }

    #[test]
    fn reuse_at_same_node_is_clear() {
        let engine = LockoutEngine::new(ChronoDuration::seconds(10));
        engine.check_and_update("U1", "N1", ts("2024-05-30 12:00:00"));
        assert!(matches!(
            engine.check_and_update("U1", "N1", ts("2024-05-30 12:00:05")),
            LockoutCheck::Clear
        ));
    }

    #[test]
    fn reuse_at_different_node_within_window_triggers() {
        let engine = LockoutEngine::new(ChronoDuration::seconds(10));
        engine.check_and_update("U1", "N1", ts("2024-05-30 12:00:00"));
        assert!(matches!(
            engine.check_and_update("U1", "N2", ts("2024-05-30 12:00:05")),
            LockoutCheck::Triggered
        ));
    }

    #[test]
    fn reuse_at_different_node_outside_window_is_clear() {
        let engine = LockoutEngine::new(ChronoDuration::seconds(10));
        engine.check_and_update("U1", "N1", ts("2024-05-30 12:00:00"));
        assert!(matches!(
            engine.check_and_update("U1", "N2", ts("2024-05-30 12:00:11")),
            LockoutCheck::Clear
        ));
    }
}
