// # Slack Notifier
//
// Posts nameserver change alerts to Slack incoming webhooks, and parses the
// interaction callbacks Slack sends when the alert's Resolve button is pressed.
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (Notifier)
//
// **Allowed Capabilities**:
// - ✅ POST to the configured webhook URLs only
// - ✅ Render payloads as Block Kit JSON
//
// **Forbidden Capabilities**:
// - ❌ Retry delivery
// - ❌ Touch the history store
//
// ## Security Requirements
//
// Incoming-webhook URLs embed their credential, so they NEVER appear in logs,
// error messages or Debug output.

mod interaction;
mod message;

pub use interaction::{ResolveAction, parse_interaction};
pub use message::{RESOLVE_ACTION_ID, alert_message, priority_color, resolution_message};

use async_trait::async_trait;
use nsmon_core::config::NotifierConfig;
use nsmon_core::model::{AlertPayload, HistoryEntry};
use nsmon_core::traits::{Notifier, NotifierFactory};
use nsmon_core::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Default HTTP timeout for webhook posts (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack incoming-webhook notifier
pub struct SlackNotifier {
    /// Default webhook
    /// ⚠️ NEVER log this value
    webhook_url: String,

    /// Channel name → webhook
    channel_webhooks: HashMap<String, String>,

    client: reqwest::Client,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut channels: Vec<&String> = self.channel_webhooks.keys().collect();
        channels.sort();
        f.debug_struct("SlackNotifier")
            .field("webhook_url", &"<REDACTED>")
            .field("channels", &channels)
            .finish()
    }
}

impl SlackNotifier {
    /// Create a notifier with a default webhook and optional per-channel webhooks
    pub fn new(
        webhook_url: impl Into<String>,
        channel_webhooks: HashMap<String, String>,
    ) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.is_empty() {
            return Err(Error::config("Slack webhook URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url,
            channel_webhooks,
            client,
        })
    }

    /// Webhook for a channel, falling back to the default
    fn webhook_for(&self, channel: Option<&str>) -> &str {
        channel
            .and_then(|channel| self.channel_webhooks.get(channel))
            .unwrap_or(&self.webhook_url)
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            // reqwest errors carry the URL
            .map_err(|e| Error::notifier(format!("Webhook request failed: {}", e.without_url())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(match status.as_u16() {
            401 | 403 => Error::auth(format!("Slack rejected the webhook. Status: {}", status)),
            404 => Error::not_found(format!("Slack webhook no longer exists: {}", error_text)),
            429 => Error::rate_limited(format!("Slack rate limit exceeded. Status: {}", status)),
            500..=599 => Error::provider(
                "slack",
                format!("Slack server error (transient): {} - {}", status, error_text),
            ),
            _ => Error::notifier(format!("Webhook post failed: {} - {}", status, error_text)),
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, payload: &AlertPayload) -> Result<()> {
        let url = self.webhook_for(payload.channel.as_deref());
        self.post(url, &alert_message(payload)).await?;

        tracing::debug!(
            zone = %payload.zone,
            channel = payload.channel.as_deref().unwrap_or("default"),
            "Slack alert delivered"
        );
        Ok(())
    }

    async fn send_resolution(&self, entry: &HistoryEntry, actor: &str) -> Result<()> {
        self.post(&self.webhook_url, &resolution_message(entry, actor))
            .await
    }

    fn notifier_name(&self) -> &'static str {
        "slack"
    }
}

/// Factory for creating Slack notifiers
pub struct SlackFactory;

impl NotifierFactory for SlackFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Slack {
                webhook_url,
                channel_webhooks,
            } => Ok(Box::new(SlackNotifier::new(
                webhook_url.clone(),
                channel_webhooks.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Slack notifier")),
        }
    }
}

/// Register the Slack notifier with a registry
pub fn register(registry: &nsmon_core::ProviderRegistry) {
    registry.register_notifier("slack", Box::new(SlackFactory));
}
