//! Architectural Contract Test: Per-Zone Serialization
//!
//! This test verifies that checks of one zone are totally ordered while
//! checks of different zones proceed independently.
//!
//! Constraints verified:
//! - Two overlapping checks of one zone never both compare against the same
//!   previous snapshot (no lost update, no duplicate entry)
//! - A zone held by a slow check never blocks another zone's check
//! - Record followed by get_current returns the just-recorded snapshot
//! - Concurrent records for many zones on the file store all land in their
//!   own zone file without waiting on each other
//!
//! If this test fails, per-zone locking is broken.

mod common;

use common::*;
use nsmon_core::traits::HistoryStore;
use nsmon_core::{
    ChangeResult, CheckOutcome, FileHistoryStore, MemoryHistoryStore, NameserverRecord,
    ZoneSnapshot,
};
use std::sync::Arc;
use std::time::Duration;

async fn overlapping_checks_record_one_change(store: Arc<dyn HistoryStore>) {
    let harness = Harness::new(store);
    harness.source.set_nameservers("example.com", &["ns1.example.net"]);
    harness.resolver.set("ns1.example.net", &["1.1.1.1"]);
    let checker = Arc::new(harness.checker());
    let zone = zone("example.com", 60);
    checker.check(&zone).await.unwrap();

    harness.resolver.set("ns1.example.net", &["1.1.1.2"]);
    harness.resolver.set_delay(Duration::from_millis(50));

    let first = tokio::spawn({
        let checker = checker.clone();
        let zone = zone.clone();
        async move { checker.check(&zone).await }
    });
    let second = tokio::spawn({
        let checker = checker.clone();
        let zone = zone.clone();
        async move { checker.check(&zone).await }
    });
    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

    let changed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, CheckOutcome::Changed { .. }))
        .count();
    assert_eq!(changed, 1, "exactly one check may see the change: {:?}", outcomes);
    assert!(outcomes.contains(&CheckOutcome::Unchanged));
    assert_eq!(harness.store.history("example.com").await.unwrap().len(), 1);
    assert_eq!(harness.notifier.sent().len(), 1);
}

#[tokio::test]
async fn overlapping_checks_memory_store() {
    overlapping_checks_record_one_change(Arc::new(MemoryHistoryStore::new())).await;
}

#[tokio::test]
async fn overlapping_checks_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileHistoryStore::new(dir.path().join("history"))
        .await
        .unwrap();
    overlapping_checks_record_one_change(Arc::new(store)).await;
}

#[tokio::test]
async fn held_zone_does_not_block_other_zones() {
    let harness = Harness::with_memory_store();
    harness.source.set_nameservers("example.com", &["ns1.example.net"]);
    harness.source.set_nameservers("example.org", &["ns1.example.net"]);
    harness.resolver.set("ns1.example.net", &["1.1.1.1"]);
    let checker = harness.checker();

    let _held = harness.store.lock_zone("example.com").await;

    let other = tokio::time::timeout(
        Duration::from_secs(1),
        checker.check(&zone("example.org", 60)),
    )
    .await;
    assert!(matches!(other, Ok(Ok(CheckOutcome::Baseline))));

    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        checker.check(&zone("example.com", 60)),
    )
    .await;
    assert!(blocked.is_err(), "a check of a held zone must wait for the holder");
}

#[tokio::test]
async fn record_then_get_current_is_consistent() {
    let store = MemoryHistoryStore::new();

    for i in 1..=3u8 {
        let snapshot = ZoneSnapshot::new(
            "example.com",
            [NameserverRecord::with_addresses(
                "ns1.example.net",
                [std::net::IpAddr::from([1, 1, 1, i])],
            )],
        );
        store
            .record("example.com", &ChangeResult::NoChange, snapshot.clone())
            .await
            .unwrap();
        assert_eq!(store.get_current("example.com").await.unwrap(), Some(snapshot));
    }
}

#[tokio::test]
async fn file_store_records_zones_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history");
    let store = Arc::new(FileHistoryStore::new(&path).await.unwrap());
    let zones: Vec<String> = (0..20).map(|i| format!("zone{i}.example")).collect();

    let snapshot = |zone: &str, last: u8| {
        ZoneSnapshot::new(
            zone,
            [NameserverRecord::with_addresses(
                "ns1.example.net",
                [std::net::IpAddr::from([10, 0, 0, last])],
            )],
        )
    };

    // Generous bound: twenty small writes in parallel
    let writes = futures::future::join_all(zones.iter().map(|zone| {
        let store = store.clone();
        let zone = zone.clone();
        async move {
            for last in 1..=3u8 {
                store
                    .record(&zone, &ChangeResult::NoChange, snapshot(&zone, last))
                    .await?;
            }
            Ok::<_, nsmon_core::Error>(())
        }
    }));
    let results = tokio::time::timeout(Duration::from_secs(10), writes)
        .await
        .expect("concurrent zone writes did not finish");
    assert!(results.iter().all(Result::is_ok), "{:?}", results);

    assert_eq!(store.list_zones().await.unwrap(), {
        let mut sorted = zones.clone();
        sorted.sort();
        sorted
    });

    let reopened = FileHistoryStore::new(&path).await.unwrap();
    for zone in &zones {
        assert!(path.join(format!("{zone}.json")).exists());
        let current = reopened.get_current(zone).await.unwrap().unwrap();
        assert_eq!(
            current.nameservers,
            snapshot(zone, 3).nameservers,
            "zone {zone} lost its last write"
        );
    }
}
