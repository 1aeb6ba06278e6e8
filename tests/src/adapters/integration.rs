#![cfg(test)]
use std::sync::Arc;

use fleetr_core::inventory::Inventory;
use fleetr_core::ports::{DeviceResolver, SnapshotStore};
use fleetr_core::reconciler::{Reconciler, ReconcilerConfig};
use fleetr_core::snapshot::{JsonSnapshotFile, SnapshotError};
use fleetr_core::sources::BindingsFile;
use fleetr_core::store::memory::MemoryAssignmentStore;
use tokio::sync::watch;

use crate::util::{net, write_file};

const BILLING: &str = r#"[
    { "id": "12", "serial_number": "SN-0012", "model": "RidgeWave 7000",
      "account": { "id": "88", "name": "Doe, Jane" } },
    { "id": "13", "mac": "00:11:22:33:44:66" }
]"#;

const DEVICE_MANAGER: &str = r#"[
    { "serial_number": "SN-0012", "imei": "356938035643809", "mac": "00-11-22-33-44-55" },
    { "mac": "00:11:22:33:44:66", "imsi": "310150000000013" }
]"#;

const SESSIONS: &str = r#"[
    { "imsi": "310150000000012", "address": "100.64.0.12" },
    { "imsi": "310150000000013", "address": "100.64.0.13" }
]"#;

/// Third source linking the IMSI to the device the billing system knows as 12.
const CELLULAR: &str = r#"[
    { "imei": "35693803564380-9", "imsi": "310150000000012" },
    { "imei": "356938035643809", "id": "12" }
]"#;

/// Records from three sources that only overlap pairwise end up as one device each,
/// and session bindings then reach the store through whichever identifier they use.
#[tokio::test]
async fn record_files_to_converged_store() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write_file(dir.path(), "billing.json", BILLING),
        write_file(dir.path(), "acs.json", DEVICE_MANAGER),
        write_file(dir.path(), "cellular.json", CELLULAR),
    ];
    let bindings = write_file(dir.path(), "sessions.json", SESSIONS);

    let inventory = Arc::new(Inventory::new());
    assert_eq!(inventory.load_files(&files).await, 6);
    assert_eq!(inventory.items().len(), 2);

    let device = inventory.resolve("310150000000012").unwrap();
    assert_eq!(device.remote_id.as_deref(), Some("12"));
    assert_eq!(device.serial_number.as_deref(), Some("SN-0012"));
    assert!(device.account.is_some());

    let store = Arc::new(MemoryAssignmentStore::new());
    let mut reconciler = Reconciler::new(
        store.clone(),
        Arc::new(BindingsFile::new(&bindings)),
        inventory.clone(),
        ReconcilerConfig::default(),
    );

    let report = reconciler.run_cycle().await;
    assert_eq!((report.created, report.unresolved), (2, 0));

    let mut devices: Vec<String> = store.assignments().into_iter().filter_map(|a| a.device).collect();
    devices.sort();
    assert_eq!(devices, vec!["12", "13"]);
    assert_eq!(inventory.resolve("13").unwrap().ipv4, Some(net("100.64.0.13")));
}

/// The cache written on shutdown seeds the next run, which then has nothing to do.
#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let records = write_file(dir.path(), "billing.json", r#"[{ "id": "12", "imsi": "310150000000012" }]"#);
    let bindings = write_file(dir.path(), "sessions.json", r#"{ "310150000000012": "100.64.0.12" }"#);
    let snapshot = Arc::new(JsonSnapshotFile::new(dir.path().join("cache.json")));

    let inventory = Arc::new(Inventory::new());
    inventory.load_files(&[records]).await;

    let first = Reconciler::new(
        Arc::new(MemoryAssignmentStore::new()),
        Arc::new(BindingsFile::new(&bindings)),
        inventory.clone(),
        ReconcilerConfig::default(),
    )
    .with_snapshots(snapshot.clone());
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(first.run(stop_rx));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    stop_tx.send(true).unwrap();
    handle.await.unwrap();

    let saved = snapshot.load().await.unwrap().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].address(), net("100.64.0.12"));

    let store = Arc::new(MemoryAssignmentStore::new());
    let mut second = Reconciler::new(
        store.clone(),
        Arc::new(BindingsFile::new(&bindings)),
        inventory,
        ReconcilerConfig::default(),
    )
    .with_snapshots(snapshot);
    assert_eq!(second.warm_start().await, 1);
    assert_eq!(store.seed(second.cache().to_vec()), 1);
    assert_eq!(store.assignments(), saved);

    let report = second.run_cycle().await;
    assert_eq!(report.unchanged, 1);
    assert_eq!(store.calls().mutations(), 0);
}

#[tokio::test]
async fn incompatible_snapshot_is_ignored_on_warm_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "cache.json", r#"{ "version": 0, "assignments": [] }"#);
    let snapshot = Arc::new(JsonSnapshotFile::new(path));

    assert!(matches!(
        snapshot.load().await,
        Err(SnapshotError::UnsupportedVersion { found: 0, .. })
    ));

    let mut reconciler = Reconciler::new(
        Arc::new(MemoryAssignmentStore::new()),
        Arc::new(BindingsFile::new(dir.path().join("sessions.json"))),
        Arc::new(Inventory::new()),
        ReconcilerConfig::default(),
    )
    .with_snapshots(snapshot);

    assert_eq!(reconciler.warm_start().await, 0);
    assert!(reconciler.cache().is_empty());
}

/// An unreadable bindings file must not wipe the store.
#[tokio::test]
async fn broken_bindings_file_deletes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let bindings = write_file(dir.path(), "sessions.json", r#"{ "310150000000012": "100.64.0.12" }"#);
    let inventory = Arc::new(Inventory::new());
    inventory.add_records([serde_json::from_str(r#"{ "id": "12", "imsi": "310150000000012" }"#).unwrap()]);

    let store = Arc::new(MemoryAssignmentStore::new());
    let mut reconciler = Reconciler::new(
        store.clone(),
        Arc::new(BindingsFile::new(&bindings)),
        inventory,
        ReconcilerConfig::default(),
    );
    reconciler.run_cycle().await;

    std::fs::write(&bindings, "{ truncated").unwrap();
    let report = reconciler.run_cycle().await;

    assert!(report.deletions_suppressed);
    assert_eq!(store.calls().delete, 0);
    assert_eq!(store.assignments().len(), 1);
}
