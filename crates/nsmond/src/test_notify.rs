//! `nsmond --test-notify`
//!
//! Sends one clearly marked sample alert through the configured notifier and
//! exits, so a webhook can be checked before the daemon is left running.
//! Nothing is recorded in history; the sample's resolution reference does not
//! match any entry, so pressing Resolve on it is answered with "not found".

use anyhow::{Context, Result};
use chrono::Utc;
use nsmon_core::{
    AlertPayload, ChangeResult, NameserverChange, NameserverRecord, Notifier, ZoneConfig,
};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Resolution reference carried by the sample alert
pub const TEST_REFERENCE: &str = "nsmond-test-notify";

/// Build a sample alert for `zone`, using documentation addresses
pub fn sample_alert(zone: &ZoneConfig) -> AlertPayload {
    let hostname = format!("ns1.{}", zone.name);
    let address = |last| IpAddr::V4(Ipv4Addr::new(192, 0, 2, last));
    let changes = vec![NameserverChange::IpChanged {
        before: NameserverRecord::with_addresses(&hostname, [address(1)]),
        after: NameserverRecord::with_addresses(&hostname, [address(2)]),
    }];

    AlertPayload {
        zone: zone.name.clone(),
        description: zone.description.clone(),
        environment: zone.environment.clone(),
        priority: zone.priority,
        summary: format!("[TEST] {}", ChangeResult::Changed(changes.clone()).describe()),
        changes,
        detected_at: Utc::now(),
        resolution_reference: TEST_REFERENCE.to_string(),
        channel: zone.channel.clone(),
    }
}

/// Send the sample alert, bounded by `timeout`
pub async fn send_test_alert(
    notifier: &dyn Notifier,
    zone: &ZoneConfig,
    timeout: Duration,
) -> Result<()> {
    let payload = sample_alert(zone);
    tokio::time::timeout(timeout, notifier.send(&payload))
        .await
        .with_context(|| format!("Test alert timed out after {:?}", timeout))?
        .with_context(|| format!("Test alert via {} failed", notifier.notifier_name()))?;

    tracing::info!(
        zone = %payload.zone,
        notifier = notifier.notifier_name(),
        "Test alert delivered"
    );
    Ok(())
}
