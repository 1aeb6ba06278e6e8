//! The local device inventory.
//!
//! Records from every source are folded into two [`MergeSet`]s, one for devices and
//! one for the accounts owning them. The reconciliation loop queries the inventory
//! through [`DeviceResolver`] to turn session-feed identifiers into devices.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use pnet::ipnetwork::Ipv4Network;
use rayon::prelude::*;
use tokio::task::JoinSet;
use tracing::debug;

use fleetr_common::identity::{Account, DeviceKey, DeviceRecord, Item};
use fleetr_common::merge_set::{Identifiable, MergeSet};
use fleetr_common::{error, info, success};

use crate::ports::DeviceResolver;
use crate::sources::read_records;
use crate::vendors::VendorRepository;

#[derive(Debug, Default)]
pub struct Inventory {
    items: MergeSet<Item>,
    accounts: MergeSet<Account>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &MergeSet<Item> {
        &self.items
    }

    pub fn accounts(&self) -> &MergeSet<Account> {
        &self.accounts
    }

    /// Merges `item` into the inventory, and its account into the account set.
    pub fn add_item(&self, item: Item) -> Item {
        if let Some(account) = &item.account {
            self.accounts.add(account.clone());
        }
        self.items.add(item)
    }

    pub fn add_records(&self, records: impl IntoIterator<Item = DeviceRecord>) -> usize {
        records
            .into_iter()
            .map(|record| self.add_item(Item::from(record)))
            .count()
    }

    /// Loads record files concurrently, one task per file.
    ///
    /// A file that cannot be read or parsed is logged and skipped; the others still
    /// load. Returns the number of records merged.
    pub async fn load_files(self: &Arc<Self>, paths: &[PathBuf]) -> usize {
        let mut tasks: JoinSet<(PathBuf, anyhow::Result<usize>)> = JoinSet::new();

        for path in paths.iter().cloned() {
            let inventory: Arc<Inventory> = Arc::clone(self);
            tasks.spawn(async move {
                let result = read_records(&path).await.map(|records| inventory.add_records(records));
                (path, result)
            });
        }

        let mut total: usize = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.context("record loader task panicked") {
                Ok((path, Ok(count))) => {
                    info!("loaded {count} records from {}", path.display());
                    total += count;
                }
                Ok((_, Err(e))) | Err(e) => error!("skipping record file: {e:#}"),
            }
        }

        success!(
            "inventory holds {} devices and {} accounts from {total} records",
            self.items.len(),
            self.accounts.len()
        );
        total
    }

    /// Fills in the vendor of every device with a MAC address and no vendor yet.
    ///
    /// Lookups run in parallel. Returns the number of devices updated.
    pub fn enrich_vendors(&self, vendors: &dyn VendorRepository) -> usize {
        let found: Vec<(DeviceKey, String)> = self
            .items
            .snapshot()
            .par_iter()
            .filter(|item| item.vendor.is_none())
            .filter_map(|item| {
                let mac = item.mac_address?;
                Some((DeviceKey::Mac(mac), vendors.get_vendor(mac)?))
            })
            .collect();

        found
            .into_iter()
            .filter(|(key, vendor)| {
                self.items.update(key, |item| {
                    debug!("{item} is made by {vendor}");
                    item.vendor = Some(vendor.clone());
                })
            })
            .count()
    }
}

impl DeviceResolver for Inventory {
    fn resolve(&self, device_id: &str) -> Option<Item> {
        DeviceKey::candidates(device_id)
            .iter()
            .find_map(|key| self.items.find(key))
    }

    fn record_address(&self, item: &Item, address: Ipv4Network) {
        let Some(key) = item.key().into_iter().next() else {
            return;
        };
        self.items.update(&key, |stored| {
            if stored.ipv4 != Some(address) {
                debug!("{stored} now at {address}");
                stored.ipv4 = Some(address);
            }
        });
    }
}
