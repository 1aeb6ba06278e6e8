//! The pull-based **reconciliation loop**.
//!
//! Every cycle compares the bindings reported by the session feed against the
//! assignments held by the remote store and issues the create, update and delete calls
//! that make the store match. Each cycle recomputes the full diff, so a call that
//! failed is simply retried by the next cycle.
//!
//! Deletions are destructive and only happen when the cycle saw the complete picture:
//! one unresolvable device, or a failed desired-state fetch, suppresses all of them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pnet::ipnetwork::Ipv4Network;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use fleetr_common::attachment::Attachment;
use fleetr_common::config::DEFAULT_DELAY;
use fleetr_common::identity::Item;
use fleetr_common::success;

use crate::ports::{AssignmentStore, Binding, DesiredStateSource, DeviceResolver, SnapshotStore, StoreError};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { delay: DEFAULT_DELAY }
    }
}

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Bindings whose device could not be resolved to a bindable item.
    pub unresolved: usize,
    /// Remote calls (including `list`) that failed and are left for the next cycle.
    pub failed_calls: usize,
    /// Stale assignments were present but kept because the cycle was incomplete.
    pub deletions_suppressed: bool,
    /// The assignment list could not be fetched, nothing was compared.
    pub skipped: bool,
}

impl CycleReport {
    /// Number of mutating calls issued successfully.
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "cycle skipped, assignment list unavailable");
        }
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} deleted, {} unresolved, {} failed calls",
            self.created, self.updated, self.unchanged, self.deleted, self.unresolved, self.failed_calls
        )?;
        if self.deletions_suppressed {
            write!(f, " (deletions suppressed)")?;
        }
        Ok(())
    }
}

/// Converges an [`AssignmentStore`] towards the bindings of a [`DesiredStateSource`].
pub struct Reconciler {
    store: Arc<dyn AssignmentStore>,
    desired: Arc<dyn DesiredStateSource>,
    resolver: Arc<dyn DeviceResolver>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    config: ReconcilerConfig,
    /// The store's assignments as of the end of the last cycle.
    cache: Vec<Attachment>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        desired: Arc<dyn DesiredStateSource>,
        resolver: Arc<dyn DeviceResolver>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            desired,
            resolver,
            snapshots: None,
            config,
            cache: Vec::new(),
        }
    }

    /// Persists the assignment cache on shutdown and restores it with [`Reconciler::warm_start`].
    pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Starts from known assignments instead of an empty cache.
    pub fn with_cache(mut self, cache: Vec<Attachment>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &[Attachment] {
        &self.cache
    }

    /// Seeds the cache from the last snapshot, if any. Failures are logged and ignored.
    pub async fn warm_start(&mut self) -> usize {
        let Some(snapshots) = &self.snapshots else {
            return 0;
        };

        match snapshots.load().await {
            Ok(Some(assignments)) => {
                info!("restored {} cached assignments", assignments.len());
                self.cache = assignments;
                self.cache.len()
            }
            Ok(None) => {
                debug!("no assignment snapshot to restore");
                0
            }
            Err(e) => {
                warn!("ignoring unreadable assignment snapshot: {e}");
                0
            }
        }
    }

    /// Runs cycles until `stop` turns `true` (or its sender is dropped), then writes
    /// the snapshot.
    ///
    /// The stop signal is checked before every cycle and interrupts the pause between
    /// cycles. A cycle already in progress is finished first.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Self {
        info!("reconciliation loop started, delay {:?}", self.config.delay);

        loop {
            if *stop.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                () = tokio::time::sleep(self.config.delay) => {}
                _ = stop.wait_for(|stopped| *stopped) => {
                    break;
                }
            }
        }

        info!("reconciliation loop stopping");
        self.save_snapshot().await;
        self
    }

    /// One full fetch, diff and converge pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut working: Vec<Attachment> = match self.store.list().await {
            Ok(assignments) => assignments,
            Err(e) => {
                error!("listing remote assignments failed, skipping cycle: {e}");
                report.failed_calls += 1;
                report.skipped = true;
                return report;
            }
        };

        let (bindings, mut safe_to_delete) = match self.desired.get_desired_bindings().await {
            Ok(bindings) => (bindings, true),
            Err(e) => {
                error!("fetching desired bindings failed: {e:#}");
                (Vec::new(), false)
            }
        };

        let mut claimed: Vec<Attachment> = Vec::with_capacity(working.len());

        for binding in bindings {
            let Some((item, device)) = self.resolve(&binding) else {
                report.unresolved += 1;
                safe_to_delete = false;
                continue;
            };

            self.resolver.record_address(&item, binding.address);
            let desired = Attachment::new(device, binding.address);

            match take_match(&mut working, &mut claimed, &desired) {
                None => self.create(desired, &mut claimed, &mut report).await,
                Some(current) if current.same_binding(&desired) => {
                    debug!("{current} already in place");
                    report.unchanged += 1;
                    claimed.push(current);
                }
                Some(current) => self.update(current, &desired, &mut claimed, &mut report).await,
            }
        }

        if safe_to_delete {
            for stale in working {
                self.delete(stale, &mut claimed, &mut report).await;
            }
        } else if !working.is_empty() {
            warn!(
                "keeping {} stale assignments, this cycle did not see every device",
                working.len()
            );
            report.deletions_suppressed = true;
            claimed.extend(working);
        }

        self.cache = claimed;

        if report.failed_calls > 0 || report.unresolved > 0 {
            warn!("reconciliation cycle: {report}");
        } else {
            success!("reconciliation cycle: {report}");
        }
        report
    }

    /// Resolves the binding's device to an item that can carry a remote assignment.
    fn resolve(&self, binding: &Binding) -> Option<(Item, String)> {
        let Some(item) = self.resolver.resolve(&binding.device_id) else {
            warn!("no inventory item matches device {:?}, skipping", binding.device_id);
            return None;
        };

        let Some(device) = item.remote_id.clone() else {
            warn!(
                "{item} (reported as {:?}) has no remote id, cannot bind {}",
                binding.device_id, binding.address
            );
            return None;
        };

        Some((item, device))
    }

    async fn create(&self, desired: Attachment, claimed: &mut Vec<Attachment>, report: &mut CycleReport) {
        match self.store.create(desired.clone()).await {
            Ok(created) => {
                info!("created assignment {created}");
                report.created += 1;
                claimed.push(created);
            }
            Err(e) => {
                error!("creating assignment {desired} failed: {e}");
                report.failed_calls += 1;
            }
        }
    }

    async fn update(
        &self,
        current: Attachment,
        desired: &Attachment,
        claimed: &mut Vec<Attachment>,
        report: &mut CycleReport,
    ) {
        let mut next: Attachment = current.clone();
        next.device = desired.device.clone();
        next.set_network(desired.address());
        next.observed_at = desired.observed_at;

        match self.store.update(next).await {
            Ok(updated) => {
                info!("updated assignment {current} to {updated}");
                report.updated += 1;
                claimed.push(updated);
            }
            Err(e) => {
                error!("updating assignment {current} to {desired} failed: {e}");
                report.failed_calls += 1;
                claimed.push(current);
            }
        }
    }

    async fn delete(&self, stale: Attachment, claimed: &mut Vec<Attachment>, report: &mut CycleReport) {
        match self.store.delete(&stale).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                info!("deleted stale assignment {stale}");
                report.deleted += 1;
            }
            Err(e) => {
                error!("deleting stale assignment {stale} failed: {e}");
                report.failed_calls += 1;
                claimed.push(stale);
            }
        }
    }

    /// Writes the assignment cache to the snapshot store, if any. Failures are logged.
    pub async fn save_snapshot(&self) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        match snapshots.save(&self.cache).await {
            Ok(()) => info!("saved {} cached assignments", self.cache.len()),
            Err(e) => error!("saving assignment snapshot failed: {e}"),
        }
    }
}

/// Finds the assignment `desired` should converge, removing it from where it was found.
///
/// Order: an unprocessed assignment bound to the same device, one already claimed this
/// cycle for the same device, then an unprocessed assignment holding the same address.
fn take_match(
    working: &mut Vec<Attachment>,
    claimed: &mut Vec<Attachment>,
    desired: &Attachment,
) -> Option<Attachment> {
    let same_device = |a: &Attachment| a.device.is_some() && a.device == desired.device;
    let address: Ipv4Network = desired.address();

    if let Some(idx) = working.iter().position(same_device) {
        return Some(working.swap_remove(idx));
    }
    if let Some(idx) = claimed.iter().position(same_device) {
        return Some(claimed.swap_remove(idx));
    }
    if let Some(idx) = working.iter().position(|a| a.ip() == address.ip()) {
        return Some(working.swap_remove(idx));
    }
    None
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
