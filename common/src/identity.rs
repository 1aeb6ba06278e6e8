//! # Identity Model
//!
//! Typed identifiers for the two entity kinds tracked by the inventory:
//!
//! * [`item::Item`]: a device (CPE, router, modem), identified by its remote id,
//!   MAC address, IMEI and IMSI.
//! * [`account::Account`]: the subscriber owning devices, identified by its remote id
//!   and normalised name.
//!
//! The *key* of an entity is the set of its non-null identifiers. Two entities of the
//! same kind denote the same real-world thing as soon as their keys share one value.

use thiserror::Error;

pub mod account;
pub mod cellular;
pub mod item;
pub mod record;

pub use account::{Account, AccountKey, AccountName, ServiceAddress};
pub use cellular::{Imei, Imsi};
pub use item::{DeviceKey, Item, Manufacturer, Model};
pub use record::{AccountRecord, AddressRecord, DeviceRecord};

/// Raised when a raw identifier cannot be turned into its typed form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),
    #[error("invalid IMEI {0:?}: expected 15 or 16 decimal digits")]
    InvalidImei(String),
    #[error("invalid IMSI {0:?}: expected 15 decimal digits")]
    InvalidImsi(String),
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),
}
