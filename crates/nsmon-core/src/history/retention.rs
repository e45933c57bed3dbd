//! History retention
//!
//! Entries are kept newest-first. Pruning first drops entries older than the
//! maximum age, then drops the oldest entries beyond the maximum count. The
//! newest entry survives both passes.

use chrono::{DateTime, Duration, Utc};

use crate::model::HistoryEntry;

/// Count and age bounds for one zone's history log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of entries kept per zone
    pub max_entries: usize,
    /// Maximum age of an entry
    pub max_age: Duration,
}

impl RetentionPolicy {
    /// Create a policy
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            max_entries,
            max_age,
        }
    }

    /// Read `max_entries` / `max_age_days` from a factory config, defaulting the rest
    pub(crate) fn from_json(config: &serde_json::Value) -> Self {
        let default = Self::default();
        let max_entries = config
            .get("max_entries")
            .and_then(serde_json::Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(default.max_entries);
        let max_age = config
            .get("max_age_days")
            .and_then(serde_json::Value::as_i64)
            .and_then(Duration::try_days)
            .unwrap_or(default.max_age);
        Self::new(max_entries, max_age)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_age: Duration::days(30),
        }
    }
}

/// Apply the policy to a newest-first log; returns how many entries were dropped
pub fn prune(
    entries: &mut Vec<HistoryEntry>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> usize {
    let before = entries.len();

    if let Some(cutoff) = now.checked_sub_signed(policy.max_age) {
        let mut index = 0;
        entries.retain(|entry| {
            let keep = index == 0 || entry.recorded_at >= cutoff;
            index += 1;
            keep
        });
    }

    entries.truncate(policy.max_entries.max(1));

    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NameserverChange, NameserverRecord, ZoneSnapshot};

    fn entry_at(at: DateTime<Utc>) -> HistoryEntry {
        let previous = ZoneSnapshot::new("example.com", []).observed_at(at);
        let current = ZoneSnapshot::new("example.com", [NameserverRecord::new("ns1.example.net")])
            .observed_at(at);
        HistoryEntry::new(
            previous,
            current,
            vec![NameserverChange::Added {
                record: NameserverRecord::new("ns1.example.net"),
            }],
        )
    }

    #[test]
    fn count_bound_keeps_newest() {
        let now = Utc::now();
        let mut entries: Vec<_> = (0..5).map(|i| entry_at(now - Duration::minutes(i))).collect();
        let newest = entries[0].id.clone();

        let dropped = prune(&mut entries, &RetentionPolicy::new(2, Duration::days(30)), now);

        assert_eq!(dropped, 3);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, newest);
    }

    #[test]
    fn age_bound_drops_old_entries() {
        let now = Utc::now();
        let mut entries = vec![
            entry_at(now - Duration::days(1)),
            entry_at(now - Duration::days(10)),
            entry_at(now - Duration::days(40)),
        ];

        prune(&mut entries, &RetentionPolicy::new(100, Duration::days(7)), now);

        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn newest_entry_survives_both_bounds() {
        let now = Utc::now();
        let mut entries = vec![
            entry_at(now - Duration::days(90)),
            entry_at(now - Duration::days(91)),
        ];
        let newest = entries[0].id.clone();

        prune(&mut entries, &RetentionPolicy::new(0, Duration::days(1)), now);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, newest);
    }

    #[test]
    fn policy_from_factory_json() {
        let policy = RetentionPolicy::from_json(&serde_json::json!({
            "type": "memory",
            "max_entries": 5,
            "max_age_days": 2
        }));
        assert_eq!(policy, RetentionPolicy::new(5, Duration::days(2)));
        assert_eq!(RetentionPolicy::from_json(&serde_json::json!({})), RetentionPolicy::default());
    }
}
