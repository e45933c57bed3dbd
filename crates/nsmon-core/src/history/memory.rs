// # Memory History Store
//
// In-memory implementation of HistoryStore.
//
// ## Purpose
//
// Provides a simple, fast history store that doesn't persist across restarts.
// Useful for testing and for deployments where re-establishing baselines
// after a restart is acceptable.
//
// ## Restart Behavior
//
// - All snapshots and history are lost on restart
// - The first check after a restart establishes a new baseline (no alert)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{RetentionPolicy, ZoneHistory, ZoneLocks, apply_ack, find_entry};
use crate::Error;
use crate::model::{ChangeResult, HistoryEntry, ZoneSnapshot, normalize_hostname};
use crate::traits::{AckOutcome, HistoryStore, HistoryStoreFactory, ZoneGuard};

/// In-memory history store implementation
///
/// # Example
///
/// ```rust,no_run
/// use nsmon_core::history::MemoryHistoryStore;
/// use nsmon_core::traits::HistoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryHistoryStore::new();
///     assert!(store.get_current("example.com").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<HashMap<String, ZoneHistory>>>,
    locks: Arc<ZoneLocks>,
    policy: RetentionPolicy,
}

impl MemoryHistoryStore {
    /// Create a new empty store with the default retention policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store with a custom retention policy
    pub fn with_retention(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Get the number of zones in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn lock_zone(&self, zone: &str) -> ZoneGuard {
        self.locks.lock(&normalize_hostname(zone)).await
    }

    async fn get_current(&self, zone: &str) -> Result<Option<ZoneSnapshot>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(&normalize_hostname(zone))
            .and_then(|history| history.current.clone()))
    }

    async fn record(
        &self,
        zone: &str,
        result: &ChangeResult,
        snapshot: ZoneSnapshot,
    ) -> Result<Option<HistoryEntry>, Error> {
        let zone = normalize_hostname(zone);
        let mut guard = self.inner.write().await;
        let history = guard.entry(zone.clone()).or_default();
        Ok(history.apply_record(&zone, result, snapshot, &self.policy))
    }

    async fn acknowledge(&self, entry_id: &str, actor: &str) -> Result<AckOutcome, Error> {
        let mut guard = self.inner.write().await;
        Ok(apply_ack(&mut guard, entry_id, actor))
    }

    async fn history(&self, zone: &str) -> Result<Vec<HistoryEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(&normalize_hostname(zone))
            .map(|history| history.entries.clone())
            .unwrap_or_default())
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<HistoryEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(find_entry(&guard, entry_id).cloned())
    }

    async fn list_zones(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        let mut zones: Vec<String> = guard.keys().cloned().collect();
        zones.sort();
        Ok(zones)
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Factory for `{"type": "memory"}`
pub struct MemoryHistoryStoreFactory;

#[async_trait]
impl HistoryStoreFactory for MemoryHistoryStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn HistoryStore>, Error> {
        Ok(Box::new(MemoryHistoryStore::with_retention(
            RetentionPolicy::from_json(config),
        )))
    }
}
