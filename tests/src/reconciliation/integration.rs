#![cfg(test)]
use std::sync::Arc;
use std::time::Duration;

use fleetr_common::attachment::Attachment;
use fleetr_core::ports::AssignmentStore;
use fleetr_core::reconciler::{Reconciler, ReconcilerConfig};
use fleetr_core::store::memory::MemoryAssignmentStore;
use tokio::sync::watch;

use crate::util::{FlakyStore, Outage, StaticFeed, imsi, inventory, net};

fn reconciler(store: Arc<FlakyStore>, feed: Arc<StaticFeed>, devices: u32) -> Reconciler {
    Reconciler::new(store, feed, inventory(devices), ReconcilerConfig::default())
}

/// A create that failed is issued again by the next cycle, and then stops.
#[tokio::test]
async fn failed_create_is_retried_next_cycle() {
    let store = FlakyStore::new(MemoryAssignmentStore::new());
    let feed = StaticFeed::with(&[(imsi(1).as_str(), "10.0.0.5")]);
    let mut reconciler = reconciler(store.clone(), feed, 1);

    store.set_outage(Outage {
        create: true,
        ..Outage::default()
    });
    let report = reconciler.run_cycle().await;
    assert_eq!(report.failed_calls, 1);
    assert!(store.inner.assignments().is_empty());
    assert!(reconciler.cache().is_empty());

    store.set_outage(Outage::default());
    let report = reconciler.run_cycle().await;
    assert_eq!(report.created, 1);
    assert_eq!(store.inner.assignments().len(), 1);

    let report = reconciler.run_cycle().await;
    assert_eq!(report.changes(), 0);
    assert_eq!(store.inner.calls().create, 1);
}

/// Without the remote listing nothing is compared, so nothing may be created.
#[tokio::test]
async fn list_failure_skips_the_cycle() {
    let store = FlakyStore::new(MemoryAssignmentStore::new());
    let feed = StaticFeed::with(&[(imsi(1).as_str(), "10.0.0.5")]);
    let mut reconciler = reconciler(store.clone(), feed, 1);

    store.set_outage(Outage {
        list: true,
        ..Outage::default()
    });
    let report = reconciler.run_cycle().await;

    assert!(report.skipped);
    assert_eq!(store.inner.calls().mutations(), 0);
}

#[tokio::test]
async fn failed_delete_keeps_assignment_cached() {
    let store = FlakyStore::new(MemoryAssignmentStore::seeded(vec![
        Attachment::new("dev9", net("10.0.0.99")).with_remote_id("5"),
    ]));
    let feed = StaticFeed::with(&[]);
    let mut reconciler = reconciler(store.clone(), feed, 1);

    store.set_outage(Outage {
        delete: true,
        ..Outage::default()
    });
    let report = reconciler.run_cycle().await;
    assert_eq!((report.deleted, report.failed_calls), (0, 1));
    assert_eq!(reconciler.cache().len(), 1);

    store.set_outage(Outage::default());
    let report = reconciler.run_cycle().await;
    assert_eq!(report.deleted, 1);
    assert!(reconciler.cache().is_empty());
    assert!(store.inner.assignments().is_empty());
}

#[tokio::test]
async fn delete_of_vanished_assignment_counts_as_done() {
    let store = FlakyStore::new(MemoryAssignmentStore::seeded(vec![
        Attachment::new("dev9", net("10.0.0.99")).with_remote_id("5"),
    ]));
    let mut reconciler = reconciler(store.clone(), StaticFeed::with(&[]), 1);

    store.set_outage(Outage {
        delete_not_found: true,
        ..Outage::default()
    });
    let report = reconciler.run_cycle().await;

    assert_eq!((report.deleted, report.failed_calls), (1, 0));
    assert!(reconciler.cache().is_empty());
}

/// A failed update leaves the old assignment in place; it is neither deleted nor
/// duplicated.
#[tokio::test]
async fn failed_update_is_not_treated_as_stale() {
    let store = FlakyStore::new(MemoryAssignmentStore::new());
    let feed = StaticFeed::with(&[(imsi(1).as_str(), "10.0.0.5")]);
    let mut reconciler = reconciler(store.clone(), feed.clone(), 1);
    reconciler.run_cycle().await;

    feed.set(&[(imsi(1).as_str(), "10.0.0.9")]);
    store.set_outage(Outage {
        update: true,
        ..Outage::default()
    });
    let report = reconciler.run_cycle().await;

    assert_eq!((report.updated, report.deleted, report.failed_calls), (0, 0, 1));
    let assignments = store.inner.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].address(), net("10.0.0.5"));
    assert_eq!(reconciler.cache().len(), 1);
}

#[tokio::test]
async fn device_without_remote_id_blocks_deletions() {
    let inventory = inventory(1);
    inventory.add_item(
        fleetr_common::identity::Item::default().with_imsi(imsi(2).parse().unwrap()),
    );
    let store = FlakyStore::new(MemoryAssignmentStore::seeded(vec![
        Attachment::new("dev9", net("10.0.0.99")).with_remote_id("5"),
    ]));
    let feed = StaticFeed::with(&[(imsi(1).as_str(), "10.0.0.5"), (imsi(2).as_str(), "10.0.0.6")]);
    let mut reconciler = Reconciler::new(store.clone(), feed, inventory, ReconcilerConfig::default());

    let report = reconciler.run_cycle().await;

    assert_eq!((report.created, report.unresolved, report.deleted), (1, 1, 0));
    assert!(report.deletions_suppressed);
    assert_eq!(store.inner.assignments().len(), 2);
}

#[tokio::test]
async fn many_devices_converge_in_one_cycle() {
    let ids: Vec<String> = (1..=20).map(imsi).collect();
    let addresses: Vec<String> = (1..=20).map(|n| format!("100.64.0.{n}")).collect();
    let bindings: Vec<(&str, &str)> = ids.iter().map(String::as_str).zip(addresses.iter().map(String::as_str)).collect();

    let store = FlakyStore::new(MemoryAssignmentStore::new());
    let mut reconciler = reconciler(store.clone(), StaticFeed::with(&bindings), 20);

    let report = reconciler.run_cycle().await;
    assert_eq!(report.created, 20);

    let report = reconciler.run_cycle().await;
    assert_eq!(report.unchanged, 20);
    assert_eq!(store.inner.calls().mutations(), 20);
    assert_eq!(store.list().await.unwrap().len(), 20);
}

#[tokio::test]
async fn loop_runs_cycles_until_stopped() {
    let store = FlakyStore::new(MemoryAssignmentStore::new());
    let feed = StaticFeed::with(&[(imsi(1).as_str(), "10.0.0.5")]);
    let reconciler = Reconciler::new(
        store.clone(),
        feed,
        inventory(1),
        ReconcilerConfig {
            delay: Duration::from_millis(10),
        },
    );
    let (stop_tx, stop_rx) = watch::channel(false);

    let handle = tokio::spawn(reconciler.run(stop_rx));
    tokio::time::sleep(Duration::from_millis(200)).await;
    stop_tx.send(true).unwrap();
    let reconciler = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not stop")
        .unwrap();

    assert!(store.inner.calls().list > 1);
    assert_eq!(store.inner.calls().create, 1);
    assert_eq!(reconciler.cache().len(), 1);
}

#[tokio::test]
async fn stopped_before_start_runs_no_cycle() {
    let store = FlakyStore::new(MemoryAssignmentStore::new());
    let reconciler = reconciler(store.clone(), StaticFeed::with(&[(imsi(1).as_str(), "10.0.0.5")]), 1);
    let (_stop_tx, stop_rx) = watch::channel(true);

    reconciler.run(stop_rx).await;

    assert_eq!(store.inner.calls().list, 0);
}
