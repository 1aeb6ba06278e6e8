use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pnet::ipnetwork::Ipv4Network;

use fleetr_common::attachment::Attachment;
use fleetr_common::identity::{Imsi, Item};
use fleetr_common::network::address::parse_ipv4;
use fleetr_core::inventory::Inventory;
use fleetr_core::ports::{AssignmentStore, Binding, DesiredStateSource, StoreError};
use fleetr_core::store::memory::MemoryAssignmentStore;

pub fn net(s: &str) -> Ipv4Network {
    parse_ipv4(s).unwrap()
}

pub fn imsi(n: u32) -> String {
    format!("3101500000{n:05}")
}

/// Inventory holding devices `dev1..=devN`, each with IMSI `imsi(n)`.
pub fn inventory(devices: u32) -> Arc<Inventory> {
    let inventory = Inventory::new();
    for n in 1..=devices {
        let imsi: Imsi = imsi(n).parse().unwrap();
        inventory.add_item(Item::default().with_remote_id(format!("dev{n}")).with_imsi(imsi));
    }
    Arc::new(inventory)
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Desired state that can be swapped between cycles.
#[derive(Default)]
pub struct StaticFeed {
    bindings: Mutex<Vec<Binding>>,
}

impl StaticFeed {
    pub fn with(bindings: &[(&str, &str)]) -> Arc<Self> {
        let feed = Arc::new(Self::default());
        feed.set(bindings);
        feed
    }

    pub fn set(&self, bindings: &[(&str, &str)]) {
        *self.bindings.lock().unwrap() = bindings.iter().map(|(id, ip)| Binding::new(*id, net(ip))).collect();
    }
}

#[async_trait]
impl DesiredStateSource for StaticFeed {
    async fn get_desired_bindings(&self) -> anyhow::Result<Vec<Binding>> {
        Ok(self.bindings.lock().unwrap().clone())
    }
}

/// Which operations of a [`FlakyStore`] currently fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct Outage {
    pub list: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    /// Deletes report the assignment as already gone, without removing it.
    pub delete_not_found: bool,
}

/// Memory store whose operations can be made to fail.
pub struct FlakyStore {
    pub inner: MemoryAssignmentStore,
    outage: Mutex<Outage>,
}

impl FlakyStore {
    pub fn new(inner: MemoryAssignmentStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            outage: Mutex::new(Outage::default()),
        })
    }

    pub fn set_outage(&self, outage: Outage) {
        *self.outage.lock().unwrap() = outage;
    }

    fn outage(&self) -> Outage {
        *self.outage.lock().unwrap()
    }
}

fn unavailable(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("{operation} timed out"))
}

#[async_trait]
impl AssignmentStore for FlakyStore {
    async fn list(&self) -> Result<Vec<Attachment>, StoreError> {
        if self.outage().list {
            return Err(unavailable("list"));
        }
        self.inner.list().await
    }

    async fn create(&self, attachment: Attachment) -> Result<Attachment, StoreError> {
        if self.outage().create {
            return Err(unavailable("create"));
        }
        self.inner.create(attachment).await
    }

    async fn update(&self, attachment: Attachment) -> Result<Attachment, StoreError> {
        if self.outage().update {
            return Err(unavailable("update"));
        }
        self.inner.update(attachment).await
    }

    async fn delete(&self, attachment: &Attachment) -> Result<(), StoreError> {
        let outage = self.outage();
        if outage.delete {
            return Err(unavailable("delete"));
        }
        if outage.delete_not_found {
            return Err(StoreError::NotFound(attachment.remote_id.clone().unwrap_or_default()));
        }
        self.inner.delete(attachment).await
    }
}
