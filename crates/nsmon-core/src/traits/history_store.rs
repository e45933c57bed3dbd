// # History Store Trait
//
// Defines the interface for the per-zone snapshot and change log.
//
// ## Purpose
//
// The history store is the only shared mutable resource in the monitor. It tracks:
// - The current (most recent successful) snapshot of each zone
// - A bounded, newest-first log of detected changes
// - The acknowledgment state of each logged change
//
// Because the store is persisted, a restart resumes comparing against the
// last known snapshot instead of establishing a fresh baseline.
//
// ## Implementations
//
// - In-memory: [`crate::history::MemoryHistoryStore`]
// - JSON file: [`crate::history::FileHistoryStore`]
//
// ## Usage
//
// ```rust,ignore
// use nsmon_core::{compare, HistoryStore};
//
// let _guard = store.lock_zone("example.com").await;
// let previous = store.get_current("example.com").await?;
// let result = compare(previous.as_ref(), &snapshot);
// let entry = store.record("example.com", &result, snapshot).await?;
// ```

use async_trait::async_trait;

use crate::model::{ChangeResult, HistoryEntry, ZoneSnapshot};

/// Exclusive access to one zone's read-compare-record section
///
/// Dropping the guard releases the zone.
pub type ZoneGuard = tokio::sync::OwnedMutexGuard<()>;

/// Result of an acknowledgment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The entry transitioned to acknowledged
    Acknowledged(HistoryEntry),
    /// The entry was already acknowledged; nothing changed
    AlreadyAcknowledged(HistoryEntry),
    /// No entry with this id exists (or it was pruned)
    NotFound,
}

/// Trait for history store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Per-zone serialization
///
/// Callers that read, compare and then record hold the guard returned by
/// [`HistoryStore::lock_zone`] for the whole sequence. Guards for different
/// zones are independent; a slow write for one zone never waits on another
/// zone's guard.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Implement locking for per-zone mutual exclusion
/// - ✅ Prune entries according to its retention policy
///
/// ## Forbidden Capabilities
/// - ❌ Compare snapshots (owned by [`crate::compare`])
/// - ❌ Send notifications (owned by [`crate::Notifier`])
/// - ❌ Spawn background tasks
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Acquire the zone's serialization guard
    async fn lock_zone(&self, zone: &str) -> ZoneGuard;

    /// Get the last persisted snapshot for a zone
    ///
    /// # Returns
    ///
    /// - `Ok(Some(snapshot))`: The current snapshot
    /// - `Ok(None)`: The zone has never been checked
    /// - `Err(Error)`: Storage error
    async fn get_current(&self, zone: &str) -> Result<Option<ZoneSnapshot>, crate::Error>;

    /// Record the outcome of one check
    ///
    /// Replaces the current snapshot. When `result` is actionable, also appends
    /// a new [`HistoryEntry`] and prunes the zone's log. The whole operation is
    /// applied atomically: on error nothing changes.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(entry))`: A history entry was created
    /// - `Ok(None)`: Baseline or no change; only the snapshot was replaced
    /// - `Err(Error)`: Storage error
    async fn record(
        &self,
        zone: &str,
        result: &ChangeResult,
        snapshot: ZoneSnapshot,
    ) -> Result<Option<HistoryEntry>, crate::Error>;

    /// Mark an entry as acknowledged
    ///
    /// Idempotent: a second call returns [`AckOutcome::AlreadyAcknowledged`]
    /// and keeps the first actor and timestamp.
    async fn acknowledge(&self, entry_id: &str, actor: &str) -> Result<AckOutcome, crate::Error>;

    /// Get a zone's history, newest first
    async fn history(&self, zone: &str) -> Result<Vec<HistoryEntry>, crate::Error>;

    /// Look up one entry by id
    async fn get_entry(&self, entry_id: &str) -> Result<Option<HistoryEntry>, crate::Error>;

    /// List all zones with a stored snapshot or history
    async fn list_zones(&self) -> Result<Vec<String>, crate::Error>;

    /// Flush any pending changes to persistent storage
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing history stores from configuration
///
/// Creation is async because persistent stores load their file on open.
#[async_trait]
pub trait HistoryStoreFactory: Send + Sync {
    /// Create a HistoryStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: The serialized [`crate::config::HistoryStoreConfig`] with the
    ///   retention settings merged in (`max_entries`, `max_age_days`)
    async fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<Box<dyn HistoryStore>, crate::Error>;
}
