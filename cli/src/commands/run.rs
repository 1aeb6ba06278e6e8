use std::sync::Arc;

use colored::*;
use tokio::sync::watch;

use fleetr_common::attachment::Attachment;
use fleetr_common::config::Config;
use fleetr_common::{info, success, warn};
use fleetr_core::reconciler::{Reconciler, ReconcilerConfig};
use fleetr_core::snapshot::JsonSnapshotFile;
use fleetr_core::sources::BindingsFile;
use fleetr_core::store::memory::MemoryAssignmentStore;

use crate::commands::{RunArgs, inventory};
use crate::fprint;
use crate::terminal::{colors, print};

pub async fn run(args: RunArgs, cfg: &Config) -> anyhow::Result<()> {
    print::header("loading inventory", cfg.quiet);
    let inventory = inventory::load(&args.inventory, cfg).await?;

    let store: Arc<MemoryAssignmentStore> = Arc::new(MemoryAssignmentStore::new());
    let desired = Arc::new(BindingsFile::new(&args.bindings));
    let config = ReconcilerConfig { delay: cfg.delay };

    let mut reconciler: Reconciler = Reconciler::new(store.clone(), desired, inventory, config);
    if let Some(path) = cfg.snapshot.clone() {
        reconciler = reconciler.with_snapshots(Arc::new(JsonSnapshotFile::new(path)));
        if reconciler.warm_start().await > 0 {
            let seeded: usize = store.seed(reconciler.cache().to_vec());
            info!("dry-run store starts with {seeded} assignments");
        }
    }

    print::header("reconciling", cfg.quiet);
    let reconciler: Reconciler = if args.once {
        reconciler.run_cycle().await;
        reconciler.save_snapshot().await;
        reconciler
    } else {
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("interrupt received, finishing the current cycle"),
                Err(e) => warn!("cannot listen for Ctrl-C, stopping: {e}"),
            }
            let _ = stop_tx.send(true);
        });
        reconciler.run(stop_rx).await
    };

    print_assignments(reconciler.cache(), cfg);
    let calls = store.calls();
    success!(
        "{} create, {} update, {} delete calls issued",
        calls.create, calls.update, calls.delete
    );
    print::end_of_program();
    Ok(())
}

fn print_assignments(assignments: &[Attachment], cfg: &Config) {
    if cfg.quiet > 1 {
        return;
    }
    print::header("assignments", cfg.quiet);

    let mut sorted: Vec<&Attachment> = assignments.iter().collect();
    sorted.sort_by_key(|a| a.ip());

    for (idx, assignment) in sorted.iter().enumerate() {
        let device: &str = assignment.device.as_deref().unwrap_or("<unbound>");
        print::tree_head(idx, &format!("device {device}"));
        print::as_tree_one_level(vec![
            ("address".into(), assignment.address().to_string().color(colors::IPV4)),
            (
                "record".into(),
                assignment.remote_id.as_deref().unwrap_or("not persisted").normal(),
            ),
        ]);
        if idx + 1 != sorted.len() {
            fprint!();
        }
    }
}
