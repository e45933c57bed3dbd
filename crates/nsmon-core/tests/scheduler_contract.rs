//! Architectural Contract Test: Scheduler Independence
//!
//! This test verifies the per-zone timers on a paused clock.
//!
//! Constraints verified:
//! - Each zone is checked at its own interval, starting immediately
//! - A zone whose check is stuck never delays another zone
//! - A tick that finds the previous check still running is skipped, not queued
//! - Cancellation stops all timers, waits for in-flight checks and returns
//!
//! If this test fails, scheduling is broken.

mod common;

use common::*;
use nsmon_core::{Error, ZoneScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn scheduler(
    harness: &Harness,
    zones: Vec<nsmon_core::ZoneConfig>,
) -> (Arc<ZoneScheduler>, CancellationToken) {
    let token = CancellationToken::new();
    let scheduler = ZoneScheduler::new(Arc::new(harness.checker()), zones)
        .with_cancellation(token.clone());
    (Arc::new(scheduler), token)
}

#[tokio::test(start_paused = true)]
async fn zones_tick_at_their_own_intervals() {
    let harness = Harness::with_memory_store();
    harness.source.set_nameservers("prod.example.com", &["ns1.example.net"]);
    harness.source.set_nameservers("staging.example.com", &["ns1.example.net"]);
    harness.resolver.set("ns1.example.net", &["1.1.1.1"]);

    let (scheduler, token) = scheduler(
        &harness,
        vec![zone("prod.example.com", 10), zone("staging.example.com", 60)],
    );
    let running = tokio::spawn(scheduler.clone().run());

    tokio::time::sleep(Duration::from_secs(65)).await;

    // prod: t = 0, 10, ..., 60; staging: t = 0, 60
    assert_eq!(harness.source.call_count("prod.example.com"), 7);
    assert_eq!(harness.source.call_count("staging.example.com"), 2);

    token.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn stuck_zone_does_not_delay_others() {
    let harness = Harness::with_memory_store();
    harness.source.hang("stuck.example.com");
    harness.source.set_nameservers("healthy.example.com", &["ns1.example.net"]);
    harness.resolver.set("ns1.example.net", &["1.1.1.1"]);

    let (scheduler, token) = scheduler(
        &harness,
        vec![zone("stuck.example.com", 5), zone("healthy.example.com", 5)],
    );
    let running = tokio::spawn(scheduler.clone().run());

    tokio::time::sleep(Duration::from_secs(32)).await;

    // healthy: t = 0, 5, ..., 30
    assert_eq!(harness.source.call_count("healthy.example.com"), 7);
    // stuck: each check runs for the 10 s call timeout, so overlapping ticks are skipped
    let stuck = harness.source.call_count("stuck.example.com");
    assert!((1..=4).contains(&stuck), "stuck zone checked {} times", stuck);

    token.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn trigger_respects_running_check() {
    let harness = Harness::with_memory_store();
    harness.source.set_nameservers("example.com", &["ns1.example.net"]);
    harness.resolver.set("ns1.example.net", &["1.1.1.1"]);
    harness.resolver.set_delay(Duration::from_secs(5));

    let (scheduler, token) = scheduler(&harness, vec![zone("example.com", 300)]);
    let running = tokio::spawn(scheduler.clone().run());

    // Let the immediate first tick start its (slow) check
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!scheduler.trigger("example.com").unwrap(), "check already running");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(scheduler.trigger("Example.COM.").unwrap());
    assert!(matches!(scheduler.trigger("unknown.example"), Err(Error::NotFound(_))));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(harness.source.call_count("example.com"), 2);

    token.cancel();
    running.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancellation_waits_for_in_flight_checks() {
    let harness = Harness::with_memory_store();
    harness.source.set_nameservers("example.com", &["ns1.example.net"]);
    harness.resolver.set("ns1.example.net", &["1.1.1.1"]);
    harness.resolver.set_delay(Duration::from_secs(3));

    let (scheduler, token) = scheduler(&harness, vec![zone("example.com", 60)]);
    let running = tokio::spawn(scheduler.clone().run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();
    running.await.unwrap().unwrap();

    // The in-flight baseline completed before run() returned
    assert!(harness.store.get_current("example.com").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(harness.source.call_count("example.com"), 1, "no ticks after cancellation");
}
