//! # Ports
//!
//! Contracts between the reconciliation loop and the outside world.
//!
//! ## Rules
//! 1. Everything here is a trait or a plain value exchanged through one.
//! 2. Implementations own their own timeout and retry policy; the loop only sees
//!    success or failure of each call.
//! 3. Implementations live in [`crate::store`], [`crate::sources`],
//!    [`crate::snapshot`] and [`crate::inventory`], or in the caller's crate.

use async_trait::async_trait;
use pnet::ipnetwork::Ipv4Network;
use thiserror::Error;

use fleetr_common::attachment::Attachment;
use fleetr_common::identity::Item;

use crate::snapshot::SnapshotError;

/// A device identifier and the address it was last seen with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// IMSI, IMEI, MAC address or remote id, as reported by the session feed.
    pub device_id: String,
    pub address: Ipv4Network,
}

impl Binding {
    pub fn new(device_id: impl Into<String>, address: Ipv4Network) -> Self {
        Self {
            device_id: device_id.into(),
            address,
        }
    }
}

/// Where the live device to address bindings come from.
#[async_trait]
pub trait DesiredStateSource: Send + Sync {
    async fn get_desired_bindings(&self) -> anyhow::Result<Vec<Binding>>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("assignment {0} does not exist")]
    NotFound(String),
    #[error("store rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The remote IP assignment store being converged.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Every assignment currently held by the store.
    async fn list(&self) -> Result<Vec<Attachment>, StoreError>;

    /// Persists a new assignment and returns it with its remote id set.
    async fn create(&self, attachment: Attachment) -> Result<Attachment, StoreError>;

    /// Rewrites the assignment identified by `attachment.remote_id`.
    async fn update(&self, attachment: Attachment) -> Result<Attachment, StoreError>;

    /// Removes the assignment. Deleting an assignment that is already gone succeeds.
    async fn delete(&self, attachment: &Attachment) -> Result<(), StoreError>;
}

/// Maps device identifiers to locally tracked devices.
pub trait DeviceResolver: Send + Sync {
    /// Looks up the device known under `device_id`. Never mutates.
    fn resolve(&self, device_id: &str) -> Option<Item>;

    /// Records the address `item` was just observed with.
    fn record_address(&self, item: &Item, address: Ipv4Network);
}

/// Durable storage for the assignment cache across restarts.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, assignments: &[Attachment]) -> Result<(), SnapshotError>;

    /// `Ok(None)` when no snapshot was written yet.
    async fn load(&self) -> Result<Option<Vec<Attachment>>, SnapshotError>;
}
