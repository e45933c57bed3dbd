//! Configuration types for the nameserver monitor
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading them from disk is the daemon's job; everything here is plain serde.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::Duration;

use crate::history::RetentionPolicy;
use crate::model::normalize_hostname;

/// Poll interval used when neither the zone nor its environment sets one
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Zone listing capability
    pub zone_source: ZoneSourceConfig,

    /// Notification capability
    pub notifier: NotifierConfig,

    /// Nameserver address resolution
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// History store configuration
    #[serde(default)]
    pub history_store: HistoryStoreConfig,

    /// Zones to monitor
    pub zones: Vec<ZoneConfig>,

    /// Per-environment defaults
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,

    /// History retention
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Checker settings
    #[serde(default)]
    pub checker: CheckerConfig,
}

impl MonitorConfig {
    /// Create a configuration for the given zones with default plugins
    pub fn new(zones: Vec<ZoneConfig>) -> Self {
        Self {
            zone_source: ZoneSourceConfig::Delegation,
            notifier: NotifierConfig::Log,
            resolver: ResolverConfig::default(),
            history_store: HistoryStoreConfig::default(),
            zones,
            environments: HashMap::new(),
            retention: RetentionConfig::default(),
            checker: CheckerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zones.is_empty() {
            return Err(crate::Error::config("No zones configured"));
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            validate_domain_name(&zone.name)?;
            if !seen.insert(normalize_hostname(&zone.name)) {
                return Err(crate::Error::config(format!(
                    "Zone configured more than once: {}",
                    zone.name
                )));
            }
        }

        self.zone_source.validate()?;
        self.notifier.validate()?;
        self.resolver.validate()?;
        self.history_store.validate()?;

        if self.retention.max_age_days == 0 {
            return Err(crate::Error::config("Retention max_age_days must be > 0"));
        }
        if self.checker.call_timeout_secs == 0 {
            return Err(crate::Error::config("Checker call_timeout_secs must be > 0"));
        }

        Ok(())
    }

    /// Zones with names normalized and environment default intervals applied
    pub fn resolved_zones(&self) -> Vec<ZoneConfig> {
        self.zones
            .iter()
            .map(|zone| {
                let mut zone = zone.clone();
                zone.name = normalize_hostname(&zone.name);
                if zone.poll_interval_secs == 0 {
                    zone.poll_interval_secs = self
                        .environments
                        .get(&zone.environment)
                        .map(|env| env.poll_interval_secs)
                        .filter(|secs| *secs > 0)
                        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
                }
                zone
            })
            .collect()
    }
}

/// Zone listing capability configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneSourceConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// Cloudflare API token with Zone:Read permission
        api_token: String,
        /// Account ID to restrict zone listing (optional)
        #[serde(default)]
        account_id: Option<String>,
    },

    /// Public DNS delegation (NS lookup through the system resolver)
    Delegation,

    /// Custom zone source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ZoneSourceConfig {
    /// Validate the zone source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ZoneSourceConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ZoneSourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom zone source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom zone source config cannot be null",
                    ));
                }
                Ok(())
            }
            ZoneSourceConfig::Delegation => Ok(()),
        }
    }

    /// Get the zone source type name
    pub fn type_name(&self) -> &str {
        match self {
            ZoneSourceConfig::Cloudflare { .. } => "cloudflare",
            ZoneSourceConfig::Delegation => "delegation",
            ZoneSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for ZoneSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneSourceConfig::Cloudflare { account_id, .. } => f
                .debug_struct("Cloudflare")
                .field("api_token", &"<REDACTED>")
                .field("account_id", account_id)
                .finish(),
            ZoneSourceConfig::Delegation => f.write_str("Delegation"),
            ZoneSourceConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// Notification capability configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Slack incoming webhooks
    Slack {
        /// Webhook used when the zone has no channel or the channel is unmapped
        webhook_url: String,
        /// Channel name → webhook URL
        #[serde(default)]
        channel_webhooks: HashMap<String, String>,
    },

    /// Write alerts to the log only
    Log,

    /// Custom notifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Slack {
                webhook_url,
                channel_webhooks,
            } => {
                if webhook_url.is_empty() {
                    return Err(crate::Error::config("Slack webhook URL cannot be empty"));
                }
                for url in std::iter::once(webhook_url).chain(channel_webhooks.values()) {
                    if !url.starts_with("https://") && !url.starts_with("http://") {
                        return Err(crate::Error::config(
                            "Slack webhook URLs must use HTTP or HTTPS scheme",
                        ));
                    }
                }
                Ok(())
            }
            NotifierConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom notifier factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom notifier config cannot be null"));
                }
                Ok(())
            }
            NotifierConfig::Log => Ok(()),
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Slack { .. } => "slack",
            NotifierConfig::Log => "log",
            NotifierConfig::Custom { factory, .. } => factory,
        }
    }
}

// Webhook URLs embed their secret, so they never reach Debug output
impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierConfig::Slack {
                channel_webhooks, ..
            } => {
                let mut channels: Vec<&String> = channel_webhooks.keys().collect();
                channels.sort();
                f.debug_struct("Slack")
                    .field("webhook_url", &"<REDACTED>")
                    .field("channels", &channels)
                    .finish()
            }
            NotifierConfig::Log => f.write_str("Log"),
            NotifierConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolver used for nameserver A/AAAA lookups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// The host's resolv.conf
    #[default]
    System,

    /// Explicit recursive resolvers, queried on port 53
    Upstream {
        /// Resolver addresses
        nameservers: Vec<IpAddr>,
    },

    /// Custom resolver
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ResolverConfig::Upstream { nameservers } if nameservers.is_empty() => Err(
                crate::Error::config("Upstream resolver needs at least one nameserver"),
            ),
            ResolverConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom resolver factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the resolver type name
    pub fn type_name(&self) -> &str {
        match self {
            ResolverConfig::System => "system",
            ResolverConfig::Upstream { .. } => "upstream",
            ResolverConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Directory used when no history store is configured
pub const DEFAULT_HISTORY_DIR: &str = "data/nameserver_history";

/// History store configuration
///
/// Defaults to a file store under [`DEFAULT_HISTORY_DIR`]. With `memory`,
/// changes made while the daemon is down are never alerted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryStoreConfig {
    /// File-based history store
    File {
        /// Directory holding one history file per zone
        path: String,
    },

    /// In-memory history store (not persistent)
    Memory,

    /// Custom history store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl Default for HistoryStoreConfig {
    fn default() -> Self {
        HistoryStoreConfig::File {
            path: DEFAULT_HISTORY_DIR.to_string(),
        }
    }
}

impl HistoryStoreConfig {
    /// Whether history survives a restart
    pub fn is_persistent(&self) -> bool {
        !matches!(self, HistoryStoreConfig::Memory)
    }

    /// Validate the history store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            HistoryStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("History directory path cannot be empty"))
            }
            HistoryStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom history store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the history store type name
    pub fn type_name(&self) -> &str {
        match self {
            HistoryStoreConfig::File { .. } => "file",
            HistoryStoreConfig::Memory => "memory",
            HistoryStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Alert priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Per-zone configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone name (e.g. "example.com")
    pub name: String,

    /// Free-form description shown in alerts
    #[serde(default)]
    pub description: String,

    /// Environment tag (e.g. "prod", "staging")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Poll interval in seconds (0 = environment default)
    #[serde(default)]
    pub poll_interval_secs: u64,

    /// Notification target (None = notifier default)
    #[serde(default)]
    pub channel: Option<String>,

    /// Alert priority
    #[serde(default)]
    pub priority: Priority,
}

impl ZoneConfig {
    /// Create a new zone configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            environment: default_environment(),
            poll_interval_secs: 0,
            channel: None,
            priority: Priority::default(),
        }
    }

    /// Set the environment tag
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Set the poll interval (whole seconds, minimum 1)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs().max(1);
        self
    }

    /// Set the notification target
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Set the alert priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Effective poll interval
    pub fn poll_interval(&self) -> Duration {
        match self.poll_interval_secs {
            0 => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

fn default_environment() -> String {
    "default".to_string()
}

/// Per-environment defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Poll interval for zones of this environment that don't set one
    pub poll_interval_secs: u64,
}

/// History retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Maximum entries kept per zone
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Maximum entry age in days
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
}

impl RetentionConfig {
    /// Convert to the store-level policy
    pub fn policy(&self) -> RetentionPolicy {
        let max_age = i64::try_from(self.max_age_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .unwrap_or(chrono::Duration::MAX);
        RetentionPolicy::new(self.max_entries, max_age)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_max_entries() -> usize {
    1000
}

fn default_max_age_days() -> u64 {
    30
}

/// Checker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Time budget for each external call (listing, resolution, notification)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Capacity of the check event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl CheckerConfig {
    /// Call timeout as a Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    let domain = domain.trim_end_matches('.');
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_defaults_fill_missing_intervals() {
        let mut config = MonitorConfig::new(vec![
            ZoneConfig::new("Example.com.").with_environment("prod"),
            ZoneConfig::new("staging.example.com").with_environment("staging"),
            ZoneConfig::new("fast.example.com")
                .with_environment("prod")
                .with_poll_interval(Duration::from_secs(15)),
            ZoneConfig::new("other.example.com").with_environment("unknown"),
        ]);
        config
            .environments
            .insert("prod".to_string(), EnvironmentConfig { poll_interval_secs: 60 });
        config
            .environments
            .insert("staging".to_string(), EnvironmentConfig { poll_interval_secs: 900 });

        let zones = config.resolved_zones();
        assert_eq!(zones[0].name, "example.com");
        assert_eq!(zones[0].poll_interval(), Duration::from_secs(60));
        assert_eq!(zones[1].poll_interval(), Duration::from_secs(900));
        assert_eq!(zones[2].poll_interval(), Duration::from_secs(15));
        assert_eq!(zones[3].poll_interval(), Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));
    }

    #[test]
    fn validate_rejects_duplicates_and_bad_names() {
        let config = MonitorConfig::new(vec![
            ZoneConfig::new("example.com"),
            ZoneConfig::new("EXAMPLE.com."),
        ]);
        assert!(config.validate().is_err());

        let config = MonitorConfig::new(vec![ZoneConfig::new("bad_label.example.com")]);
        assert!(config.validate().is_err());

        let config = MonitorConfig::new(vec![]);
        assert!(config.validate().is_err());

        let config = MonitorConfig::new(vec![ZoneConfig::new("example.com")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zone_config_defaults_from_json() {
        let zone: ZoneConfig = serde_json::from_str(r#"{"name": "example.com"}"#).unwrap();
        assert_eq!(zone.priority, Priority::Medium);
        assert_eq!(zone.environment, "default");
        assert_eq!(zone.channel, None);
        assert_eq!(zone.poll_interval(), Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));
    }

    #[test]
    fn tagged_plugin_configs_parse() {
        let json = r#"{
            "zone_source": {"type": "cloudflare", "api_token": "secret-token"},
            "notifier": {"type": "slack", "webhook_url": "https://hooks.slack.com/services/T/B/X"},
            "history_store": {"type": "file", "path": "/var/lib/nsmon/history"},
            "zones": [{"name": "example.com", "priority": "critical"}]
        }"#;
        let config: MonitorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.zone_source.type_name(), "cloudflare");
        assert_eq!(config.notifier.type_name(), "slack");
        assert_eq!(config.history_store.type_name(), "file");
        assert_eq!(config.zones[0].priority, Priority::Critical);
        assert_eq!(config.retention.max_entries, 1000);
        assert_eq!(config.checker.call_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn history_defaults_to_persistent_store() {
        let json = r#"{
            "zone_source": {"type": "delegation"},
            "notifier": {"type": "log"},
            "zones": [{"name": "example.com"}]
        }"#;
        let config: MonitorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.history_store.type_name(), "file");
        assert!(config.history_store.is_persistent());
        assert!(matches!(
            &config.history_store,
            HistoryStoreConfig::File { path } if path == DEFAULT_HISTORY_DIR
        ));

        let memory: HistoryStoreConfig = serde_json::from_str(r#"{"type": "memory"}"#).unwrap();
        assert!(!memory.is_persistent());
    }

    #[test]
    fn resolver_config_parses_and_validates() {
        let config = MonitorConfig::new(vec![ZoneConfig::new("example.com")]);
        assert_eq!(config.resolver.type_name(), "system");

        let json = r#"{"type": "upstream", "nameservers": ["9.9.9.9", "2620:fe::fe"]}"#;
        let upstream: ResolverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(upstream.type_name(), "upstream");
        assert!(upstream.validate().is_ok());

        let empty = ResolverConfig::Upstream { nameservers: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn secrets_are_not_exposed_in_debug() {
        let source = ZoneSourceConfig::Cloudflare {
            api_token: "secret_token_12345".to_string(),
            account_id: None,
        };
        let notifier = NotifierConfig::Slack {
            webhook_url: "https://hooks.slack.com/services/SECRET".to_string(),
            channel_webhooks: HashMap::new(),
        };
        let debug = format!("{:?} {:?}", source, notifier);
        assert!(!debug.contains("secret_token"));
        assert!(!debug.contains("SECRET"));
    }

    #[test]
    fn slack_webhook_scheme_is_checked() {
        let notifier = NotifierConfig::Slack {
            webhook_url: "hooks.slack.com/services/x".to_string(),
            channel_webhooks: HashMap::new(),
        };
        assert!(notifier.validate().is_err());
    }
}
