//! Data model shared by the comparator, the history store and the checker
//!
//! Address sets are `BTreeSet`s, so resolver ordering never leaks into equality
//! or into the persisted form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::config::{Priority, ZoneConfig};

/// Normalize a DNS hostname: trimmed, lower-cased, no trailing root dot
pub fn normalize_hostname(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// One nameserver and the addresses it resolved to during a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameserverRecord {
    /// Normalized nameserver hostname
    pub hostname: String,
    /// Resolved IPv4 addresses
    #[serde(default)]
    pub ipv4: BTreeSet<Ipv4Addr>,
    /// Resolved IPv6 addresses
    #[serde(default)]
    pub ipv6: BTreeSet<Ipv6Addr>,
    /// At least one address family failed to resolve
    ///
    /// Informational only: change detection compares the address sets.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolved: bool,
}

impl NameserverRecord {
    /// Create a record with no addresses
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: normalize_hostname(hostname),
            ipv4: BTreeSet::new(),
            ipv6: BTreeSet::new(),
            unresolved: false,
        }
    }

    /// Create a record from a list of mixed-family addresses
    pub fn with_addresses(hostname: &str, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut record = Self::new(hostname);
        for ip in addresses {
            record.add_address(ip);
        }
        record
    }

    /// Create a record for a nameserver whose lookups failed
    pub fn unresolved(hostname: &str) -> Self {
        Self {
            unresolved: true,
            ..Self::new(hostname)
        }
    }

    /// Add one address to the matching family set
    pub fn add_address(&mut self, ip: IpAddr) {
        match ip {
            IpAddr::V4(v4) => {
                self.ipv4.insert(v4);
            }
            IpAddr::V6(v6) => {
                self.ipv6.insert(v6);
            }
        }
    }

    /// Set equality on both address families
    pub fn same_addresses(&self, other: &Self) -> bool {
        self.ipv4 == other.ipv4 && self.ipv6 == other.ipv6
    }

    /// Whether no address of either family is known
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// All addresses, IPv4 first
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ipv4
            .iter()
            .map(|ip| IpAddr::V4(*ip))
            .chain(self.ipv6.iter().map(|ip| IpAddr::V6(*ip)))
    }

    /// Comma-separated address list for messages
    pub fn format_addresses(&self) -> String {
        if self.is_empty() {
            return if self.unresolved {
                "(unresolved)".to_string()
            } else {
                "(none)".to_string()
            };
        }
        self.addresses()
            .map(|ip| ip.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn merge(&mut self, other: NameserverRecord) {
        self.ipv4.extend(other.ipv4);
        self.ipv6.extend(other.ipv6);
        self.unresolved = self.unresolved && other.unresolved;
    }
}

/// What a zone's delegation looked like at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    /// Zone name
    pub zone: String,
    /// Nameserver records keyed by hostname
    pub nameservers: BTreeMap<String, NameserverRecord>,
    /// When the observation was made
    pub observed_at: DateTime<Utc>,
}

impl ZoneSnapshot {
    /// Assemble a snapshot observed now
    ///
    /// Records sharing a hostname are merged into one.
    pub fn new(zone: &str, records: impl IntoIterator<Item = NameserverRecord>) -> Self {
        let mut nameservers: BTreeMap<String, NameserverRecord> = BTreeMap::new();
        for record in records {
            match nameservers.get_mut(&record.hostname) {
                Some(existing) => existing.merge(record),
                None => {
                    nameservers.insert(record.hostname.clone(), record);
                }
            }
        }

        Self {
            zone: normalize_hostname(zone),
            nameservers,
            observed_at: Utc::now(),
        }
    }

    /// Override the observation time
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    /// Look up one nameserver
    pub fn get(&self, hostname: &str) -> Option<&NameserverRecord> {
        self.nameservers.get(&normalize_hostname(hostname))
    }

    /// Hostnames in order
    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.nameservers.keys().map(String::as_str)
    }
}

/// One difference between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NameserverChange {
    /// Hostname present now but not before
    Added { record: NameserverRecord },
    /// Hostname present before but not now
    Removed { record: NameserverRecord },
    /// Hostname present in both with different address sets
    IpChanged {
        before: NameserverRecord,
        after: NameserverRecord,
    },
}

impl NameserverChange {
    /// Hostname this change is about
    pub fn hostname(&self) -> &str {
        match self {
            Self::Added { record } | Self::Removed { record } => &record.hostname,
            Self::IpChanged { after, .. } => &after.hostname,
        }
    }

    /// One-line human description
    pub fn describe(&self) -> String {
        match self {
            Self::Added { record } => format!(
                "nameserver added: {} [{}]",
                record.hostname,
                record.format_addresses()
            ),
            Self::Removed { record } => format!(
                "nameserver removed: {} [{}]",
                record.hostname,
                record.format_addresses()
            ),
            Self::IpChanged { before, after } => format!(
                "IP changed: {} [{}] -> [{}]",
                after.hostname,
                before.format_addresses(),
                after.format_addresses()
            ),
        }
    }
}

/// Outcome of comparing a new snapshot against the previous one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeResult {
    /// No previous snapshot existed; persisted but never alerted
    Baseline,
    /// Same hostnames with identical address sets
    NoChange,
    /// One or more differences, reported together
    Changed(Vec<NameserverChange>),
}

impl ChangeResult {
    /// Whether this result should produce a history entry and a notification
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Changed(changes) if !changes.is_empty())
    }

    /// The individual changes (empty unless `Changed`)
    pub fn changes(&self) -> &[NameserverChange] {
        match self {
            Self::Changed(changes) => changes,
            _ => &[],
        }
    }

    /// Human description of the whole result
    pub fn describe(&self) -> String {
        match self {
            Self::Baseline => "baseline established".to_string(),
            Self::NoChange => "no change".to_string(),
            Self::Changed(changes) => changes
                .iter()
                .map(NameserverChange::describe)
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Acknowledgment state of a history entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AckState {
    #[default]
    Unacknowledged,
    Acknowledged {
        /// Who acknowledged
        by: String,
        /// When it was first acknowledged
        at: DateTime<Utc>,
    },
}

/// A recorded change event for one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique id; doubles as the resolution reference sent with alerts
    pub id: String,
    /// Zone name
    pub zone: String,
    /// Snapshot the change was detected against
    pub previous: ZoneSnapshot,
    /// Snapshot that revealed the change
    pub current: ZoneSnapshot,
    /// What changed
    pub changes: Vec<NameserverChange>,
    /// One-line description
    pub description: String,
    /// When the change was detected
    pub recorded_at: DateTime<Utc>,
    /// Acknowledgment state
    #[serde(default)]
    pub ack: AckState,
}

impl HistoryEntry {
    /// Create a new unacknowledged entry
    ///
    /// # Visibility
    ///
    /// This is `pub(crate)`: entries are only created by `HistoryStore`
    /// implementations while recording an actionable change.
    pub(crate) fn new(
        previous: ZoneSnapshot,
        current: ZoneSnapshot,
        changes: Vec<NameserverChange>,
    ) -> Self {
        let description = ChangeResult::Changed(changes.clone()).describe();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            zone: current.zone.clone(),
            recorded_at: current.observed_at,
            previous,
            current,
            changes,
            description,
            ack: AckState::Unacknowledged,
        }
    }

    /// Whether the entry has been acknowledged
    pub fn is_acknowledged(&self) -> bool {
        matches!(self.ack, AckState::Acknowledged { .. })
    }
}

/// Everything a notifier needs to deliver one alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Zone name
    pub zone: String,
    /// Zone description from configuration
    pub description: String,
    /// Environment tag (e.g. "prod")
    pub environment: String,
    /// Alert priority
    pub priority: Priority,
    /// Before/after detail
    pub changes: Vec<NameserverChange>,
    /// One-line summary of all changes
    pub summary: String,
    /// Detection time
    pub detected_at: DateTime<Utc>,
    /// Reference for the acknowledgment callback
    pub resolution_reference: String,
    /// Target channel (None = notifier default)
    pub channel: Option<String>,
}

impl AlertPayload {
    /// Build the payload for a freshly recorded entry
    pub fn from_entry(zone: &ZoneConfig, entry: &HistoryEntry) -> Self {
        Self {
            zone: entry.zone.clone(),
            description: zone.description.clone(),
            environment: zone.environment.clone(),
            priority: zone.priority,
            changes: entry.changes.clone(),
            summary: entry.description.clone(),
            detected_at: entry.recorded_at,
            resolution_reference: entry.id.clone(),
            channel: zone.channel.clone(),
        }
    }
}
