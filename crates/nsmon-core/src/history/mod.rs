// # History Store Implementations
//
// This module provides implementations of the HistoryStore trait for
// different persistence strategies, plus the pieces they share: per-zone
// locks, the per-zone record/acknowledge transitions and retention pruning.

pub mod file;
pub mod memory;
pub mod retention;

pub use file::{FileHistoryStore, FileHistoryStoreFactory};
pub use memory::{MemoryHistoryStore, MemoryHistoryStoreFactory};
pub use retention::RetentionPolicy;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::model::{AckState, ChangeResult, HistoryEntry, ZoneSnapshot};
use crate::traits::{AckOutcome, ZoneGuard};

/// Everything stored for one zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneHistory {
    /// Snapshot from the most recent successful check
    #[serde(default)]
    pub current: Option<ZoneSnapshot>,
    /// Change log, newest first
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

impl ZoneHistory {
    /// Replace the current snapshot and log the change if it is actionable
    pub(crate) fn apply_record(
        &mut self,
        zone: &str,
        result: &ChangeResult,
        snapshot: ZoneSnapshot,
        policy: &RetentionPolicy,
    ) -> Option<HistoryEntry> {
        let previous = self.current.replace(snapshot.clone());

        let changes = match result {
            ChangeResult::Changed(changes) if !changes.is_empty() => changes.clone(),
            _ => return None,
        };

        let previous = previous.unwrap_or_else(|| {
            ZoneSnapshot::new(zone, []).observed_at(snapshot.observed_at)
        });
        let entry = HistoryEntry::new(previous, snapshot, changes);
        self.entries.insert(0, entry.clone());

        let dropped = retention::prune(&mut self.entries, policy, Utc::now());
        if dropped > 0 {
            tracing::debug!(zone = %zone, dropped, "Pruned history entries");
        }

        Some(entry)
    }

    /// Whether this zone's log holds the entry
    pub(crate) fn contains(&self, entry_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == entry_id)
    }

    /// Acknowledge one of this zone's entries
    pub(crate) fn apply_ack(&mut self, entry_id: &str, actor: &str) -> AckOutcome {
        match self.entries.iter_mut().find(|entry| entry.id == entry_id) {
            None => AckOutcome::NotFound,
            Some(entry) if entry.is_acknowledged() => {
                AckOutcome::AlreadyAcknowledged(entry.clone())
            }
            Some(entry) => {
                entry.ack = AckState::Acknowledged {
                    by: actor.to_string(),
                    at: Utc::now(),
                };
                AckOutcome::Acknowledged(entry.clone())
            }
        }
    }
}

/// Find an entry by id across all zones
pub(crate) fn find_entry<'a>(
    zones: &'a HashMap<String, ZoneHistory>,
    entry_id: &str,
) -> Option<&'a HistoryEntry> {
    zones
        .values()
        .flat_map(|history| history.entries.iter())
        .find(|entry| entry.id == entry_id)
}

/// Acknowledge an entry in place
///
/// Returns `NotFound` when the id is unknown. The first actor and timestamp
/// are kept on repeated calls.
pub(crate) fn apply_ack(
    zones: &mut HashMap<String, ZoneHistory>,
    entry_id: &str,
    actor: &str,
) -> AckOutcome {
    zones
        .values_mut()
        .find(|history| history.contains(entry_id))
        .map_or(AckOutcome::NotFound, |history| history.apply_ack(entry_id, actor))
}

/// One async mutex per zone, created on first use
///
/// Zones never contend with each other; only callers naming the same zone wait.
#[derive(Debug, Default)]
pub struct ZoneLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ZoneLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a zone
    pub async fn lock(&self, zone: &str) -> ZoneGuard {
        // Clone the Arc out so the shard lock is released before awaiting
        let mutex = self
            .locks
            .entry(zone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
