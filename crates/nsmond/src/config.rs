//! Daemon configuration
//!
//! The monitor itself is described by a YAML file (`NSMON_CONFIG`, default
//! `config.yaml`) deserialized into [`MonitorConfig`]. A handful of
//! environment variables override it so secrets can stay out of the file.

use anyhow::{Context, Result};
use nsmon_core::MonitorConfig;
use nsmon_core::config::{HistoryStoreConfig, NotifierConfig, ZoneSourceConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Everything the daemon needs to start
#[derive(Debug)]
pub struct DaemonConfig {
    /// Monitor configuration after env overrides
    pub monitor: MonitorConfig,
    /// Where the callback listener binds
    pub listen_addr: SocketAddr,
    /// tracing level name
    pub log_level: String,
    /// File the monitor configuration came from
    pub config_path: PathBuf,
}

impl DaemonConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for environment variables
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = PathBuf::from(
            lookup("NSMON_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string()),
        );

        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let mut monitor: MonitorConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        apply_overrides(&mut monitor, &lookup);

        let listen_addr = lookup("NSMON_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr.parse().with_context(|| {
            format!("NSMON_LISTEN_ADDR is not a socket address: {}", listen_addr)
        })?;

        Ok(Self {
            monitor,
            listen_addr,
            log_level: lookup("NSMON_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            config_path,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "NSMON_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        // The directory itself is created on startup
        if let HistoryStoreConfig::File { path } = &self.monitor.history_store
            && Path::new(path).is_file()
        {
            anyhow::bail!(
                "History path {} is a file. \
                History is stored as one file per zone; point it at a directory",
                path
            );
        }

        Ok(())
    }
}

/// Apply `NSMON_*` overrides on top of the file configuration
fn apply_overrides(monitor: &mut MonitorConfig, lookup: &impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup("NSMON_CLOUDFLARE_API_TOKEN") {
        match &mut monitor.zone_source {
            ZoneSourceConfig::Cloudflare { api_token, .. } => *api_token = token,
            _ => {
                monitor.zone_source = ZoneSourceConfig::Cloudflare {
                    api_token: token,
                    account_id: None,
                }
            }
        }
    }

    if let Some(url) = lookup("NSMON_SLACK_WEBHOOK_URL") {
        match &mut monitor.notifier {
            NotifierConfig::Slack { webhook_url, .. } => *webhook_url = url,
            _ => {
                monitor.notifier = NotifierConfig::Slack {
                    webhook_url: url,
                    channel_webhooks: HashMap::new(),
                }
            }
        }
    }

    if let Some(path) = lookup("NSMON_STATE_PATH") {
        monitor.history_store = HistoryStoreConfig::File { path };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
zone_source:
  type: delegation
notifier:
  type: log
environments:
  prod:
    poll_interval_secs: 60
zones:
  - name: example.com
    environment: prod
    priority: high
    channel: ops
  - name: example.org
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let file = write_config(YAML);
        let path = file.path().to_str().unwrap();
        let config = DaemonConfig::load(env(&[("NSMON_CONFIG", path)])).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.log_level, "info");
        assert!(matches!(config.monitor.notifier, NotifierConfig::Log));
        assert!(config.validate().is_ok());

        let zones = config.monitor.resolved_zones();
        assert_eq!(zones[0].poll_interval_secs, 60);
        assert_eq!(zones[0].channel.as_deref(), Some("ops"));
        assert_eq!(zones[1].poll_interval_secs, 300);
    }

    #[test]
    fn test_env_overrides() {
        let file = write_config(YAML);
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("history");
        let config = DaemonConfig::load(env(&[
            ("NSMON_CONFIG", file.path().to_str().unwrap()),
            ("NSMON_CLOUDFLARE_API_TOKEN", "cf-token"),
            ("NSMON_SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/T/B/X"),
            ("NSMON_STATE_PATH", state.to_str().unwrap()),
            ("NSMON_LISTEN_ADDR", "127.0.0.1:8080"),
            ("NSMON_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert!(matches!(
            &config.monitor.zone_source,
            ZoneSourceConfig::Cloudflare { api_token, .. } if api_token == "cf-token"
        ));
        assert_eq!(config.monitor.notifier.type_name(), "slack");
        assert_eq!(config.monitor.history_store.type_name(), "file");
        assert_eq!(config.listen_addr.port(), 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_state_path_must_not_be_a_file() {
        let file = write_config(YAML);
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("nameserver_history.json");
        std::fs::write(&legacy, b"{}").unwrap();

        let config = DaemonConfig::load(env(&[
            ("NSMON_CONFIG", file.path().to_str().unwrap()),
            ("NSMON_STATE_PATH", legacy.to_str().unwrap()),
        ]))
        .unwrap();
        assert!(config.validate().is_err());

        let config = DaemonConfig::load(env(&[
            ("NSMON_CONFIG", file.path().to_str().unwrap()),
            ("NSMON_STATE_PATH", dir.path().join("not-yet/created").to_str().unwrap()),
        ]))
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = DaemonConfig::load(env(&[("NSMON_CONFIG", "/nonexistent/nsmon.yaml")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let file = write_config(YAML);
        let config = DaemonConfig::load(env(&[
            ("NSMON_CONFIG", file.path().to_str().unwrap()),
            ("NSMON_LOG_LEVEL", "chatty"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let file = write_config(YAML);
        let config = DaemonConfig::load(env(&[
            ("NSMON_CONFIG", file.path().to_str().unwrap()),
            ("NSMON_CLOUDFLARE_API_TOKEN", "super-secret-token"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("super-secret-token"));
    }
}
