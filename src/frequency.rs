// src/frequency.rs
// Ranks UIDs by number of observed authentication attempts over a sliding
// window, for the Allow-List Cache's publication view (spec.md §4.3/§4.4).
//
// No direct counterpart in the original source; recovered from spec.md's
// description alone. Malformed lines are skipped rather than aborting the
// scan, matching the error-handling posture of the rest of the coordinator.

use crate::log_store::AccessLogStore;
use crate::types::DATE_FORMAT;
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::collections::HashMap;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_TOP_K: usize = 100;

struct Tally {
    count: u64,
    first_seen: NaiveDateTime,
}

/// Return up to `k` uids from `store`, most-frequent first, restricted to
/// events within `window` of `now`. Ties are broken by first-seen order.
pub fn top_uids(store: &AccessLogStore, now: NaiveDateTime, window: ChronoDuration, k: usize) -> Vec<String> {
    let cutoff = now - window;
    let mut tallies: HashMap<String, Tally> = HashMap::new();

    let Ok(raw) = store.read_all() else {
        return Vec::new();
    };
    let contents = String::from_utf8_lossy(&raw);

    for line in contents.lines() {
        let mut fields = line.splitn(5, ',');
        let (Some(ts_field), Some(uid_field)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(ts) = NaiveDateTime::parse_from_str(ts_field, DATE_FORMAT) else {
            continue;
        };
        if ts < cutoff {
            continue;
        }
        let uid = uid_field.to_string();
        tallies
            .entry(uid)
            .and_modify(|t| t.count += 1)
            .or_insert(Tally {
                count: 1,
                first_seen: ts,
            });
    }

    let mut ranked: Vec<(String, Tally)> = tallies.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.count
            .cmp(&a.1.count)
            .then_with(|| a.1.first_seen.cmp(&b.1.first_seen))
    });

    ranked.into_iter().take(k).map(|(uid, _)| uid).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn ranks_by_count_then_first_seen() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccessLogStore::new(dir.path().join("log.csv"));
        store.append(ts("2024-05-30 12:00:00"), "A", "N1", true, "k").unwrap();
        store.append(ts("2024-05-30 12:00:01"), "B", "N1", true, "k").unwrap();
        store.append(ts("2024-05-30 12:00:02"), "B", "N1", true, "k").unwrap();
        store.append(ts("2024-05-30 12:00:03"), "C", "N1", true, "k").unwrap();

        let top = top_uids(&store, ts("2024-05-30 12:00:10"), ChronoDuration::days(7), 100);
        assert_eq!(top, vec!["B".to_string(), "A".to_string(), "C".to_string()]);
    }

    #[test]
    fn excludes_entries_outside_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccessLogStore::new(dir.path().join("log.csv"));
        store.append(ts("2024-05-01 00:00:00"), "OLD", "N1", true, "k").unwrap();
        store.append(ts("2024-05-30 12:00:00"), "NEW", "N1", true, "k").unwrap();

        let top = top_uids(&store, ts("2024-05-30 12:00:01"), ChronoDuration::days(7), 100);
        assert_eq!(top, vec!["NEW".to_string()]);
    }

    #[test]
    fn skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, "garbage line with no commas\n2024-05-30 12:00:00,OK,N1,True,k\n").unwrap();
        let store = AccessLogStore::new(path);

        let top = top_uids(&store, ts("2024-05-30 12:00:01"), ChronoDuration::days(7), 100);
        assert_eq!(top, vec!["OK".to_string()]);
    }

    #[test]
    fn absent_log_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccessLogStore::new(dir.path().join("missing.csv"));
        let top = top_uids(&store, ts("2024-05-30 12:00:01"), ChronoDuration::days(7), 100);
        assert!(top.is_empty());
    }
}
