//! File backed sources: device record exports and the bindings feed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;

use fleetr_common::identity::DeviceRecord;
use fleetr_common::network::address::parse_ipv4;

use crate::ports::{Binding, DesiredStateSource};

/// Reads a JSON array of device records, as exported by one inventory source.
pub async fn read_records(path: &Path) -> anyhow::Result<Vec<DeviceRecord>> {
    let bytes: Vec<u8> = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    serde_json::from_slice(&bytes).with_context(|| format!("{} is not a list of device records", path.display()))
}

#[derive(Deserialize)]
struct BindingEntry {
    #[serde(alias = "imsi", alias = "device")]
    device_id: String,
    #[serde(alias = "ip", alias = "ipv4")]
    address: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BindingsDocument {
    List(Vec<BindingEntry>),
    Map(BTreeMap<String, String>),
}

/// Desired state read from a JSON file on every cycle.
///
/// Accepts either `[{"device_id": "...", "address": "a.b.c.d"}, ...]` or
/// `{"<device_id>": "a.b.c.d", ...}`. A single unusable entry fails the whole fetch,
/// since acting on a partial feed could delete live assignments.
#[derive(Debug, Clone)]
pub struct BindingsFile {
    path: PathBuf,
}

impl BindingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn parse_bindings(bytes: &[u8]) -> anyhow::Result<Vec<Binding>> {
    let entries: Vec<(String, String)> = match serde_json::from_slice(bytes)? {
        BindingsDocument::List(list) => list.into_iter().map(|e| (e.device_id, e.address)).collect(),
        BindingsDocument::Map(map) => map.into_iter().collect(),
    };

    entries
        .into_iter()
        .map(|(device_id, address)| -> anyhow::Result<Binding> {
            let device_id: &str = device_id.trim();
            if device_id.is_empty() {
                bail!("binding for {address} has an empty device id");
            }
            let address = parse_ipv4(&address).with_context(|| format!("binding for {device_id}"))?;
            Ok(Binding::new(device_id, address))
        })
        .collect()
}

#[async_trait]
impl DesiredStateSource for BindingsFile {
    async fn get_desired_bindings(&self) -> anyhow::Result<Vec<Binding>> {
        let bytes: Vec<u8> = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read bindings from {}", self.path.display()))?;

        parse_bindings(&bytes).with_context(|| format!("invalid bindings in {}", self.path.display()))
    }
}
