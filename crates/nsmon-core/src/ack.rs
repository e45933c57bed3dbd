//! Acknowledgment handler
//!
//! Turns an inbound "resolve" callback into a state transition on the history
//! entry named by its resolution reference. Safe to call any number of times
//! with the same reference; only the first call changes anything and only the
//! first call sends the resolution follow-up.
//!
//! The follow-up is bounded by a short timeout: interactive callers such as
//! Slack drop the request if no answer arrives within three seconds.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::HistoryEntry;
use crate::traits::{AckOutcome, HistoryStore, Notifier};

/// Actor recorded when the callback did not identify anyone
const UNKNOWN_ACTOR: &str = "unknown";

/// Default budget for the resolution follow-up
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Result reported back to the callback caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckResult {
    /// The entry is now acknowledged
    Acknowledged(HistoryEntry),
    /// The entry had already been acknowledged
    AlreadyAcknowledged(HistoryEntry),
    /// No entry carries this reference
    NotFound,
}

/// Applies resolution callbacks to the history store
#[derive(Clone)]
pub struct AckHandler {
    store: Arc<dyn HistoryStore>,
    notifier: Option<Arc<dyn Notifier>>,
    resolution_timeout: Duration,
}

impl AckHandler {
    /// Create a handler that only updates history
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            notifier: None,
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
        }
    }

    /// Also post a resolution follow-up on fresh acknowledgments
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set how long the resolution follow-up may take before it is abandoned
    pub fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = timeout;
        self
    }

    /// Acknowledge the entry named by `reference`
    ///
    /// # Returns
    ///
    /// - `Ok(AckResult)`: A definite answer for the caller
    /// - `Err(Error)`: The store could not be read or written
    pub async fn acknowledge(&self, reference: &str, actor: &str) -> Result<AckResult> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(AckResult::NotFound);
        }

        let actor = match actor.trim() {
            "" => UNKNOWN_ACTOR,
            actor => actor,
        };

        match self.store.acknowledge(reference, actor).await? {
            AckOutcome::Acknowledged(entry) => {
                info!(
                    zone = %entry.zone,
                    entry_id = %entry.id,
                    actor = %actor,
                    "Change acknowledged"
                );
                self.announce(&entry, actor).await;
                Ok(AckResult::Acknowledged(entry))
            }
            AckOutcome::AlreadyAcknowledged(entry) => {
                info!(entry_id = %entry.id, actor = %actor, "Change was already acknowledged");
                Ok(AckResult::AlreadyAcknowledged(entry))
            }
            AckOutcome::NotFound => {
                warn!(reference = %reference, "Acknowledgment for unknown reference");
                Ok(AckResult::NotFound)
            }
        }
    }

    async fn announce(&self, entry: &HistoryEntry, actor: &str) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let send = notifier.send_resolution(entry, actor);
        match tokio::time::timeout(self.resolution_timeout, send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                entry_id = %entry.id,
                notifier = notifier.notifier_name(),
                error = %e,
                "Failed to send resolution follow-up"
            ),
            Err(_) => warn!(
                entry_id = %entry.id,
                notifier = notifier.notifier_name(),
                timeout = ?self.resolution_timeout,
                "Resolution follow-up timed out"
            ),
        }
    }
}
