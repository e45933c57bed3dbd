// # Notifier Trait
//
// Defines the interface for delivering change alerts.
//
// Delivery is fire-and-forget from the checker's point of view: a failed send
// is logged and never rolls back the recorded history entry.
//
// ## Implementations
//
// - Slack incoming webhooks: `nsmon-notify-slack` crate
// - Log-only: [`crate::checker::LogNotifier`]

use async_trait::async_trait;

use crate::model::{AlertPayload, HistoryEntry};

/// Trait for notification implementations
///
/// # Trust Level: Untrusted (Plugin)
///
/// ## Allowed Capabilities
/// - ✅ Perform network I/O to the chat/paging service
/// - ✅ Render the payload in a service-specific format
///
/// ## Forbidden Capabilities
/// - ❌ Retry delivery (a missed alert is recovered from history)
/// - ❌ Mutate history or acknowledge entries
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one change alert
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Accepted by the remote service
    /// - `Err(Error)`: Delivery failed
    async fn send(&self, payload: &AlertPayload) -> Result<(), crate::Error>;

    /// Announce that a change was acknowledged
    ///
    /// The default implementation does nothing.
    async fn send_resolution(
        &self,
        _entry: &HistoryEntry,
        _actor: &str,
    ) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Get the notifier name (for logging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error>;
}
