//! # Attachment
//!
//! A binding between a device and an IPv4 address, as held by the remote assignment
//! store. An attachment built from a local observation has no remote id until the
//! store creates it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use pnet::ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{IdentityError, Item};
use crate::network::address::{self, HOST_PREFIX, serde_ipv4};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("{0} has no remote id to bind an address to")]
    MissingDevice(String),
    #[error("{0} has no observed address")]
    MissingAddress(String),
    #[error("assignment record has an unusable subnet: {0}")]
    InvalidSubnet(#[from] IdentityError),
}

/// Assignment as exchanged with the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: Option<String>,
    /// `a.b.c.d/p`
    pub subnet: String,
    /// Remote id of the inventory item the address is assigned to.
    pub ipassignmentable_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub remote_id: Option<String>,
    /// Remote id of the device the address is bound to.
    pub device: Option<String>,
    #[serde(with = "serde_ipv4")]
    address: Ipv4Network,
    pub observed_at: Option<DateTime<Utc>>,
}

/// What two attachments are compared on, in order of precedence.
#[derive(Debug, PartialEq, Eq, Hash)]
enum AttachmentIdentity<'a> {
    Remote(&'a str),
    Device(&'a str),
    Address(Ipv4Network),
}

impl Attachment {
    /// A fresh, not yet persisted binding observed now.
    pub fn new(device: impl Into<String>, address: Ipv4Network) -> Self {
        Self {
            remote_id: None,
            device: Some(device.into()),
            address,
            observed_at: Some(Utc::now()),
        }
    }

    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    pub fn address(&self) -> Ipv4Network {
        self.address
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.address.ip()
    }

    /// Parses and stores `a.b.c.d` (stored as a /32) or `a.b.c.d/p`.
    pub fn set_address(&mut self, address: &str) -> Result<(), IdentityError> {
        self.address = address::parse_ipv4(address)?;
        Ok(())
    }

    /// Stores `address` with the given prefix, `/32` when `None`.
    pub fn set_ip(&mut self, address: Ipv4Addr, prefix: Option<u8>) -> Result<(), IdentityError> {
        self.address = address::host_network(address, prefix.unwrap_or(HOST_PREFIX))?;
        Ok(())
    }

    pub fn set_network(&mut self, address: Ipv4Network) {
        self.address = address;
    }

    /// `true` when both bind the same device to the same address.
    pub fn same_binding(&self, other: &Attachment) -> bool {
        self.device == other.device && self.address == other.address
    }

    pub fn to_record(&self) -> AssignmentRecord {
        AssignmentRecord {
            id: self.remote_id.clone(),
            subnet: address::format_ipv4(&self.address),
            ipassignmentable_id: self.device.clone(),
        }
    }

    fn identity(&self) -> AttachmentIdentity<'_> {
        if let Some(id) = &self.remote_id {
            AttachmentIdentity::Remote(id)
        } else if let Some(device) = &self.device {
            AttachmentIdentity::Device(device)
        } else {
            AttachmentIdentity::Address(self.address)
        }
    }
}

/// Builds the binding a device currently reports.
pub fn item_to_attachment(item: &Item) -> Result<Attachment, AttachmentError> {
    let device: &str = item
        .remote_id
        .as_deref()
        .ok_or_else(|| AttachmentError::MissingDevice(item.to_string()))?;
    let address: Ipv4Network = item
        .ipv4
        .ok_or_else(|| AttachmentError::MissingAddress(item.to_string()))?;

    Ok(Attachment::new(device, address))
}

impl TryFrom<AssignmentRecord> for Attachment {
    type Error = AttachmentError;

    fn try_from(record: AssignmentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            remote_id: record.id,
            device: record.ipassignmentable_id,
            address: address::parse_ipv4(&record.subnet)?,
            observed_at: None,
        })
    }
}

impl PartialEq for Attachment {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Attachment {}

impl Hash for Attachment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.device.as_deref().unwrap_or("<unbound>"),
            address::format_ipv4(&self.address)
        )?;
        if let Some(id) = &self.remote_id {
            write!(f, " (assignment {id})")?;
        }
        Ok(())
    }
}
