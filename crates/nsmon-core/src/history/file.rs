// # File History Store
//
// File-based implementation of HistoryStore with crash recovery.
//
// ## Purpose
//
// Keeps each zone's current snapshot and change log across daemon restarts,
// so the first check after a restart compares against the last persisted
// snapshot instead of establishing a new baseline.
//
// ## Layout
//
// One JSON file per zone inside the store directory:
//
// ```text
// <dir>/example.com.json          current state
// <dir>/example.com.json.backup   previous state
// <dir>/example.com.json.tmp      in-flight write
// ```
//
// A write only ever touches the file of the zone being written, and writes
// for different zones run in parallel. Adding a zone to the configuration
// just adds a file.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "zone": "example.com",
//   "current": { "zone": "example.com", "nameservers": { ... }, "observed_at": "..." },
//   "entries": [ { "id": "...", "changes": [ ... ], "ack": { "state": "unacknowledged" } } ]
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{RetentionPolicy, ZoneHistory, ZoneLocks, find_entry};
use crate::Error;
use crate::model::{ChangeResult, HistoryEntry, ZoneSnapshot, normalize_hostname};
use crate::traits::{AckOutcome, HistoryStore, HistoryStoreFactory, ZoneGuard};

/// History file format version
/// Used for future migration if format changes
const HISTORY_FILE_VERSION: &str = "1.0";

const ZONE_FILE_EXTENSION: &str = ".json";

/// File-based history store with crash recovery
///
/// Every mutation is applied to a copy of the zone's in-memory state, written
/// to that zone's file, and only then made visible. A failed write leaves both
/// the file and the in-memory state as they were, so the next check re-detects
/// the change.
///
/// # Example
///
/// ```rust,no_run
/// use nsmon_core::history::FileHistoryStore;
/// use nsmon_core::traits::HistoryStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileHistoryStore::new("/var/lib/nsmon/history").await?;
///     let current = store.get_current("example.com").await?;
///     println!("{current:?}");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileHistoryStore {
    dir: PathBuf,
    zones: RwLock<HashMap<String, ZoneHistory>>,
    /// Serializes copy-write-swap per zone file
    write_locks: ZoneLocks,
    locks: ZoneLocks,
    policy: RetentionPolicy,
}

/// On-disk format of one zone file
#[derive(Debug, serde::Deserialize)]
struct ZoneFile {
    version: String,
    zone: String,
    #[serde(flatten)]
    history: ZoneHistory,
}

#[derive(serde::Serialize)]
struct ZoneFileRef<'a> {
    version: &'a str,
    zone: &'a str,
    #[serde(flatten)]
    history: &'a ZoneHistory,
}

impl FileHistoryStore {
    /// Create or load a file history store with the default retention policy
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        Self::with_retention(dir, RetentionPolicy::default()).await
    }

    /// Create or load a file history store
    ///
    /// This will:
    /// 1. Create the store directory if needed
    /// 2. Load every zone file in it
    /// 3. If a zone file is corrupted, try to load its backup
    /// 4. If both fail, start that zone with empty history
    pub async fn with_retention<P: AsRef<Path>>(
        dir: P,
        policy: RetentionPolicy,
    ) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();

        if dir.is_file() {
            return Err(Error::config(format!(
                "History path {} is a file; it must be a directory",
                dir.display()
            )));
        }

        fs::create_dir_all(&dir).await.map_err(|e| {
            Error::config(format!(
                "Failed to create history directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let zones = Self::load_dir(&dir).await?;
        tracing::debug!("Loaded history for {} zones from {}", zones.len(), dir.display());

        Ok(Self {
            dir,
            zones: RwLock::new(zones),
            write_locks: ZoneLocks::new(),
            locks: ZoneLocks::new(),
            policy,
        })
    }

    /// Load every zone file in the directory
    async fn load_dir(dir: &Path) -> Result<HashMap<String, ZoneHistory>, Error> {
        let mut zones = HashMap::new();
        let mut entries = fs::read_dir(dir).await.map_err(|e| {
            Error::history_store(format!("Failed to list {}: {}", dir.display(), e))
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            Error::history_store(format!("Failed to list {}: {}", dir.display(), e))
        })? {
            let path = entry.path();
            let is_zone_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(ZONE_FILE_EXTENSION));
            if !is_zone_file {
                continue;
            }

            if let Some(file) = Self::load_with_recovery(&path).await? {
                zones.insert(normalize_hostname(&file.zone), file.history);
            }
        }

        Ok(zones)
    }

    /// Load one zone file with automatic recovery
    async fn load_with_recovery(path: &Path) -> Result<Option<ZoneFile>, Error> {
        let err = match Self::load(path).await {
            Ok(file) => return Ok(Some(file)),
            Err(e) => e,
        };

        // Only a parse failure counts as corruption; anything else is surfaced
        if !matches!(err, Error::Json(_)) {
            return Err(err);
        }

        tracing::warn!(
            "History file {} appears corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = Self::sibling(path, "backup");
        if !backup_path.exists() {
            tracing::error!(
                "No backup for {}. Starting that zone with empty history.",
                path.display()
            );
            return Ok(None);
        }

        match Self::load(&backup_path).await {
            Ok(file) => {
                tracing::info!("Recovered history for {} from backup", file.zone);
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!(
                        "Failed to restore history file from backup: {}",
                        restore_err
                    );
                }
                Ok(Some(file))
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup of {} also corrupted: {}. Starting that zone with empty history.",
                    path.display(),
                    backup_err
                );
                Ok(None)
            }
        }
    }

    /// Load one zone file
    async fn load(path: &Path) -> Result<ZoneFile, Error> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::history_store(format!(
                "Failed to read history file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: ZoneFile = serde_json::from_str(&content)?;

        if file.version != HISTORY_FILE_VERSION {
            tracing::warn!(
                "History file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                HISTORY_FILE_VERSION,
                file.version
            );
        }

        Ok(file)
    }

    /// Write one zone's state to its file atomically
    async fn write_zone(&self, zone: &str, history: &ZoneHistory) -> Result<(), Error> {
        let file = ZoneFileRef {
            version: HISTORY_FILE_VERSION,
            zone,
            history,
        };

        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| Error::history_store(format!("Failed to serialize history: {}", e)))?;

        let path = self.zone_path(zone);
        let temp_path = Self::sibling(&path, "tmp");
        {
            let mut handle = fs::File::create(&temp_path).await.map_err(|e| {
                Error::history_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            handle.write_all(&json).await.map_err(|e| {
                Error::history_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            handle.sync_all().await.map_err(|e| {
                Error::history_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if path.exists() {
            let backup_path = Self::sibling(&path, "backup");
            if let Err(e) = fs::copy(&path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &path).await.map_err(|e| {
            Error::history_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("History written to file: {}", path.display());
        Ok(())
    }

    /// Apply a mutation to a copy of one zone, persist it, then publish it
    ///
    /// The closure returns its output and whether anything changed; unchanged
    /// state is not written. Only writers of the same zone wait for each other.
    async fn mutate_zone<T>(
        &self,
        zone: &str,
        apply: impl FnOnce(&mut ZoneHistory) -> (T, bool),
    ) -> Result<T, Error> {
        let _write = self.write_locks.lock(zone).await;

        let mut next = self
            .zones
            .read()
            .await
            .get(zone)
            .cloned()
            .unwrap_or_default();
        let (output, changed) = apply(&mut next);
        if !changed {
            return Ok(output);
        }

        self.write_zone(zone, &next).await?;
        self.zones.write().await.insert(zone.to_string(), next);
        Ok(output)
    }

    fn zone_path(&self, zone: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", zone_file_stem(zone), ZONE_FILE_EXTENSION))
    }

    /// `<path>.<suffix>`, e.g. `example.com.json.backup`
    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// File name for a zone; anything outside `[a-z0-9._-]` is percent-escaped
fn zone_file_stem(zone: &str) -> String {
    let mut stem = String::with_capacity(zone.len());
    for (i, byte) in zone.bytes().enumerate() {
        match byte {
            b'.' if i == 0 => stem.push_str("%2E"),
            b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => stem.push(byte as char),
            _ => stem.push_str(&format!("%{:02X}", byte)),
        }
    }
    stem
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn lock_zone(&self, zone: &str) -> ZoneGuard {
        self.locks.lock(&normalize_hostname(zone)).await
    }

    async fn get_current(&self, zone: &str) -> Result<Option<ZoneSnapshot>, Error> {
        let guard = self.zones.read().await;
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
        let policy = self.policy;
        self.mutate_zone(&zone, |history| {
            (history.apply_record(&zone, result, snapshot, &policy), true)
        })
        .await
    }

    async fn acknowledge(&self, entry_id: &str, actor: &str) -> Result<AckOutcome, Error> {
        let zone = {
            let guard = self.zones.read().await;
            guard
                .iter()
                .find(|(_, history)| history.contains(entry_id))
                .map(|(zone, _)| zone.clone())
        };
        let Some(zone) = zone else {
            return Ok(AckOutcome::NotFound);
        };

        // Re-checked on the copy: retention may have dropped the entry meanwhile
        self.mutate_zone(&zone, |history| {
            let outcome = history.apply_ack(entry_id, actor);
            let changed = matches!(outcome, AckOutcome::Acknowledged(_));
            (outcome, changed)
        })
        .await
    }

    async fn history(&self, zone: &str) -> Result<Vec<HistoryEntry>, Error> {
        let guard = self.zones.read().await;
        Ok(guard
            .get(&normalize_hostname(zone))
            .map(|history| history.entries.clone())
            .unwrap_or_default())
    }

    async fn get_entry(&self, entry_id: &str) -> Result<Option<HistoryEntry>, Error> {
        let guard = self.zones.read().await;
        Ok(find_entry(&guard, entry_id).cloned())
    }

    async fn list_zones(&self) -> Result<Vec<String>, Error> {
        let guard = self.zones.read().await;
        let mut zones: Vec<String> = guard.keys().cloned().collect();
        zones.sort();
        Ok(zones)
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every mutation is written before it becomes visible; rewrite once more
        // so a shutdown always leaves a fresh file and backup behind.
        let zones: Vec<String> = self.zones.read().await.keys().cloned().collect();
        for zone in zones {
            let _write = self.write_locks.lock(&zone).await;
            let history = self.zones.read().await.get(&zone).cloned();
            if let Some(history) = history {
                self.write_zone(&zone, &history).await?;
            }
        }
        Ok(())
    }
}

/// Factory for `{"type": "file", "path": "<directory>"}`
pub struct FileHistoryStoreFactory;

#[async_trait]
impl HistoryStoreFactory for FileHistoryStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn HistoryStore>, Error> {
        let path = config
            .get("path")
            .and_then(serde_json::Value::as_str)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| Error::config("File history store requires a 'path'"))?;

        let store =
            FileHistoryStore::with_retention(path, RetentionPolicy::from_json(config)).await?;
        Ok(Box::new(store))
    }
}
