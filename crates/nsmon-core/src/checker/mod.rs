//! Zone checker
//!
//! One check of one zone:
//!
//! ```text
//!   ZoneSource ── hostnames ──► NameserverResolver (A + AAAA, concurrent)
//!                                      │
//!                                      ▼
//!                                 ZoneSnapshot
//!                                      │
//!          ┌──── zone guard ───────────┼─────────────────────┐
//!          │   HistoryStore::get_current ─► compare ─► record │
//!          └───────────────────────────┼─────────────────────┘
//!                                      ▼
//!                          Notifier::send (actionable only)
//! ```
//!
//! Every external call is bounded by the call timeout. A listing or lookup
//! timeout aborts the check before anything is persisted; the next scheduled
//! tick is the retry. A lookup *error* marks that nameserver unresolved and the
//! check carries on. Notification failures never undo the recorded entry.

mod log_notifier;

pub use log_notifier::{LogNotifier, LogNotifierFactory};

use futures::future::join_all;
use std::collections::BTreeSet;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::compare::compare;
use crate::config::ZoneConfig;
use crate::error::{Error, Result};
use crate::model::{
    AlertPayload, ChangeResult, HistoryEntry, NameserverRecord, ZoneSnapshot, normalize_hostname,
};
use crate::traits::{HistoryStore, NameserverResolver, Notifier, RecordType, ZoneSource};

/// Default time budget for one external call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Events emitted by the ZoneChecker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckEvent {
    /// A check began
    CheckStarted { zone: String },

    /// First snapshot stored; no alert
    BaselineEstablished { zone: String, nameservers: usize },

    /// Snapshot identical to the stored one
    NoChange { zone: String },

    /// A change was recorded in history
    ChangeDetected {
        zone: String,
        entry_id: String,
        description: String,
    },

    /// The alert for a recorded change was delivered
    NotificationSent { zone: String, entry_id: String },

    /// The alert for a recorded change could not be delivered
    NotificationFailed {
        zone: String,
        entry_id: String,
        error: String,
    },

    /// The check was abandoned; nothing was persisted
    CheckFailed { zone: String, error: String },
}

/// What one successful check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No prior snapshot existed; this one is now the baseline
    Baseline,
    /// Nothing changed
    Unchanged,
    /// A change was recorded
    Changed {
        /// History entry / resolution reference
        entry_id: String,
        /// Whether the alert was delivered
        notified: bool,
    },
}

/// Runs checks for any configured zone
///
/// The checker holds no per-zone state of its own; everything durable lives
/// in the [`HistoryStore`]. It is cheap to share behind an `Arc` between the
/// scheduler's zone tasks.
pub struct ZoneChecker {
    zone_source: Arc<dyn ZoneSource>,
    resolver: Arc<dyn NameserverResolver>,
    store: Arc<dyn HistoryStore>,
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
    event_tx: Option<mpsc::Sender<CheckEvent>>,
}

impl ZoneChecker {
    /// Create a checker from its four collaborators
    pub fn new(
        zone_source: Arc<dyn ZoneSource>,
        resolver: Arc<dyn NameserverResolver>,
        store: Arc<dyn HistoryStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            zone_source,
            resolver,
            store,
            notifier,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            event_tx: None,
        }
    }

    /// Override the per-call timeout
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Emit [`CheckEvent`]s on a bounded channel of the given capacity
    ///
    /// When the channel is full new events are dropped with a warning.
    pub fn with_events(mut self, capacity: usize) -> (Self, mpsc::Receiver<CheckEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.event_tx = Some(tx);
        (self, rx)
    }

    /// The history store this checker records into
    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Check one zone once
    ///
    /// # Returns
    ///
    /// - `Ok(CheckOutcome)`: The snapshot was recorded
    /// - `Err(Error)`: The check was abandoned (already logged); retry next tick
    pub async fn check(&self, zone: &ZoneConfig) -> Result<CheckOutcome> {
        let name = normalize_hostname(&zone.name);
        self.emit_event(CheckEvent::CheckStarted { zone: name.clone() });

        match self.run_check(&name, zone).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if e.is_transient() {
                    warn!(zone = %name, error = %e, "Check skipped, will retry next interval");
                } else {
                    error!(zone = %name, error = %e, "Check failed");
                }
                self.emit_event(CheckEvent::CheckFailed {
                    zone: name,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_check(&self, name: &str, zone: &ZoneConfig) -> Result<CheckOutcome> {
        let (result, entry) = {
            // Held from observation through record: checks of one zone are totally ordered
            let _guard = self.store.lock_zone(name).await;

            let snapshot = self.observe(name).await?;
            let previous = self.store.get_current(name).await?;
            let result = compare(previous.as_ref(), &snapshot);
            let nameservers = snapshot.nameservers.len();
            let entry = self.store.record(name, &result, snapshot).await?;

            if matches!(result, ChangeResult::Baseline) {
                info!(zone = %name, nameservers, "Baseline established");
                self.emit_event(CheckEvent::BaselineEstablished {
                    zone: name.to_string(),
                    nameservers,
                });
            }
            (result, entry)
        };

        match (result, entry) {
            (ChangeResult::Baseline, _) => Ok(CheckOutcome::Baseline),
            (ChangeResult::NoChange, _) => {
                debug!(zone = %name, "No nameserver change");
                self.emit_event(CheckEvent::NoChange {
                    zone: name.to_string(),
                });
                Ok(CheckOutcome::Unchanged)
            }
            (ChangeResult::Changed(_), Some(entry)) => {
                warn!(
                    zone = %name,
                    entry_id = %entry.id,
                    changes = %entry.description,
                    "Nameserver change detected"
                );
                self.emit_event(CheckEvent::ChangeDetected {
                    zone: name.to_string(),
                    entry_id: entry.id.clone(),
                    description: entry.description.clone(),
                });

                let notified = self.notify(zone, &entry).await;
                Ok(CheckOutcome::Changed {
                    entry_id: entry.id,
                    notified,
                })
            }
            (ChangeResult::Changed(_), None) => Err(Error::history_store(format!(
                "Store did not create a history entry for a change in {}",
                name
            ))),
        }
    }

    /// Fetch nameservers and resolve them into a snapshot
    async fn observe(&self, zone: &str) -> Result<ZoneSnapshot> {
        let listed = self
            .bounded(
                format!("{} nameserver listing", self.zone_source.source_name()),
                self.zone_source.get_nameservers(zone),
            )
            .await?;

        let hostnames: BTreeSet<String> = listed
            .iter()
            .map(|hostname| normalize_hostname(hostname))
            .filter(|hostname| !hostname.is_empty())
            .collect();

        if hostnames.is_empty() {
            return Err(Error::zone_source(format!(
                "{} returned no nameservers for {}",
                self.zone_source.source_name(),
                zone
            )));
        }

        let records = join_all(hostnames.iter().map(|hostname| self.resolve_nameserver(hostname)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        Ok(ZoneSnapshot::new(zone, records))
    }

    /// Resolve A and AAAA for one nameserver
    ///
    /// Lookup errors are folded into the record; only a timeout is returned.
    async fn resolve_nameserver(&self, hostname: &str) -> Result<NameserverRecord> {
        let (v4, v6) = tokio::join!(
            self.lookup(hostname, RecordType::A),
            self.lookup(hostname, RecordType::Aaaa)
        );

        let mut record = NameserverRecord::new(hostname);
        for (record_type, answer) in [(RecordType::A, v4?), (RecordType::Aaaa, v6?)] {
            match answer {
                Ok(addresses) => addresses.into_iter().for_each(|ip| record.add_address(ip)),
                Err(e) => {
                    warn!(
                        nameserver = %hostname,
                        record_type = %record_type,
                        error = %e,
                        "Lookup failed, marking nameserver unresolved"
                    );
                    record.unresolved = true;
                }
            }
        }
        Ok(record)
    }

    /// Outer `Err` is a timeout, inner `Err` a resolver failure
    async fn lookup(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<Result<Vec<IpAddr>>> {
        tokio::time::timeout(self.call_timeout, self.resolver.resolve(hostname, record_type))
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "{} lookup for {} exceeded {:?}",
                    record_type, hostname, self.call_timeout
                ))
            })
    }

    async fn notify(&self, zone: &ZoneConfig, entry: &HistoryEntry) -> bool {
        let payload = AlertPayload::from_entry(zone, entry);

        let sent = self
            .bounded(
                format!("{} notification", self.notifier.notifier_name()),
                self.notifier.send(&payload),
            )
            .await;

        match sent {
            Ok(()) => {
                info!(zone = %entry.zone, entry_id = %entry.id, "Alert sent");
                self.emit_event(CheckEvent::NotificationSent {
                    zone: entry.zone.clone(),
                    entry_id: entry.id.clone(),
                });
                true
            }
            Err(e) => {
                warn!(
                    zone = %entry.zone,
                    entry_id = %entry.id,
                    error = %e,
                    "Alert delivery failed; change remains in history"
                );
                self.emit_event(CheckEvent::NotificationFailed {
                    zone: entry.zone.clone(),
                    entry_id: entry.id.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Run an external call under the call timeout
    async fn bounded<T>(
        &self,
        what: String,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "{} exceeded {:?}",
                what, self.call_timeout
            ))),
        }
    }

    fn emit_event(&self, event: CheckEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        if tx.try_send(event).is_err() {
            warn!("Check event channel full or closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedSource(Vec<String>);

    #[async_trait]
    impl ZoneSource for FixedSource {
        async fn list_zones(&self, _filter: Option<&str>) -> Result<Vec<String>> {
            Ok(vec!["example.com".to_string()])
        }

        async fn get_nameservers(&self, _zone: &str) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }

        fn source_name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Answers from a table; hostnames missing from the table fail
    #[derive(Default)]
    struct TableResolver {
        answers: Mutex<HashMap<(String, RecordType), Vec<IpAddr>>>,
    }

    impl TableResolver {
        fn set(&self, hostname: &str, record_type: RecordType, ips: &[&str]) {
            self.answers.lock().unwrap().insert(
                (hostname.to_string(), record_type),
                ips.iter().map(|ip| ip.parse().unwrap()).collect(),
            );
        }
    }

    #[async_trait]
    impl NameserverResolver for TableResolver {
        async fn resolve(&self, hostname: &str, record_type: RecordType) -> Result<Vec<IpAddr>> {
            self.answers
                .lock()
                .unwrap()
                .get(&(hostname.to_string(), record_type))
                .cloned()
                .ok_or_else(|| Error::resolver(format!("SERVFAIL for {}", hostname)))
        }
    }

    fn checker(source: Vec<&str>, resolver: Arc<TableResolver>) -> ZoneChecker {
        ZoneChecker::new(
            Arc::new(FixedSource(source.into_iter().map(String::from).collect())),
            resolver,
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(LogNotifier),
        )
    }

    #[tokio::test]
    async fn nameserver_hostnames_are_normalized_and_deduplicated() {
        let resolver = Arc::new(TableResolver::default());
        resolver.set("ns1.example.net", RecordType::A, &["1.1.1.1"]);
        resolver.set("ns1.example.net", RecordType::Aaaa, &[]);
        let checker = checker(vec!["NS1.example.net.", "ns1.example.net"], resolver);

        let outcome = checker.check(&ZoneConfig::new("example.com")).await.unwrap();
        assert_eq!(outcome, CheckOutcome::Baseline);

        let current = checker.store().get_current("example.com").await.unwrap().unwrap();
        assert_eq!(current.nameservers.len(), 1);
        assert!(!current.get("ns1.example.net").unwrap().unresolved);
    }

    #[tokio::test]
    async fn failed_lookup_marks_only_that_nameserver_unresolved() {
        let resolver = Arc::new(TableResolver::default());
        resolver.set("ns1.example.net", RecordType::A, &["1.1.1.1"]);
        resolver.set("ns1.example.net", RecordType::Aaaa, &["2001:db8::1"]);
        let checker = checker(vec!["ns1.example.net", "ns2.example.net"], resolver);

        checker.check(&ZoneConfig::new("example.com")).await.unwrap();

        let current = checker.store().get_current("example.com").await.unwrap().unwrap();
        let ns1 = current.get("ns1.example.net").unwrap();
        let ns2 = current.get("ns2.example.net").unwrap();
        assert_eq!(ns1.ipv6.len(), 1);
        assert!(!ns1.unresolved);
        assert!(ns2.unresolved);
        assert!(ns2.is_empty());
    }

    #[tokio::test]
    async fn empty_listing_is_a_failed_tick() {
        let checker = checker(vec![], Arc::new(TableResolver::default()));
        let (checker, mut events) = checker.with_events(8);

        let err = checker.check(&ZoneConfig::new("example.com")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(checker.store().get_current("example.com").await.unwrap().is_none());

        assert!(matches!(events.recv().await, Some(CheckEvent::CheckStarted { .. })));
        assert!(matches!(events.recv().await, Some(CheckEvent::CheckFailed { .. })));
    }
}
