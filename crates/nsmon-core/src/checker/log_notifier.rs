//! Log-only notifier
//!
//! Writes alerts to the tracing log instead of a chat service. Selected with
//! `notifier: { type: log }`; also the fallback when no webhook is configured.

use async_trait::async_trait;
use tracing::warn;

use crate::config::NotifierConfig;
use crate::error::{Error, Result};
use crate::model::{AlertPayload, HistoryEntry};
use crate::traits::{Notifier, NotifierFactory};

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, payload: &AlertPayload) -> Result<()> {
        warn!(
            zone = %payload.zone,
            environment = %payload.environment,
            priority = %payload.priority,
            reference = %payload.resolution_reference,
            "ALERT: {}",
            payload.summary
        );
        Ok(())
    }

    async fn send_resolution(&self, entry: &HistoryEntry, actor: &str) -> Result<()> {
        tracing::info!(zone = %entry.zone, entry_id = %entry.id, actor = %actor, "Change resolved");
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}

/// Factory for `{"type": "log"}`
pub struct LogNotifierFactory;

impl NotifierFactory for LogNotifierFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Log => Ok(Box::new(LogNotifier)),
            other => Err(Error::config(format!(
                "Log notifier cannot be built from '{}' configuration",
                other.type_name()
            ))),
        }
    }
}
