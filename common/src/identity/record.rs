//! Raw records as exported by the individual sources.
//!
//! Every field is an optional string; conversion into an [`Item`] validates each
//! identifier on its own. An invalid identifier is logged and dropped while the rest of
//! the record is kept, since the other identifiers may still link it to a device.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Account, AccountName, Item, Manufacturer, Model, ServiceAddress};
use crate::network::address::parse_ipv4;
use crate::network::mac::parse_mac;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceRecord {
    #[serde(alias = "id")]
    pub remote_id: Option<String>,
    #[serde(alias = "mac")]
    pub mac_address: Option<String>,
    pub imei: Option<String>,
    pub imsi: Option<String>,
    pub serial_number: Option<String>,
    pub product_id: Option<String>,
    pub info: Option<String>,
    pub apn: Option<String>,
    #[serde(alias = "ip")]
    pub ipv4: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub linked_to_account: bool,
    pub account: Option<AccountRecord>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountRecord {
    #[serde(alias = "id")]
    pub remote_id: Option<String>,
    pub name: Option<String>,
    pub address: Option<AddressRecord>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressRecord {
    #[serde(alias = "id")]
    pub remote_id: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "zip")]
    pub zip_code: Option<String>,
}

/// Trims and drops blank strings.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an optional field, logging and discarding values that fail validation.
fn parse_field<T, E: std::fmt::Display>(
    value: Option<String>,
    field: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Option<T> {
    let value: String = present(value)?;
    match parse(&value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("dropping {field} from record: {e}");
            None
        }
    }
}

impl From<DeviceRecord> for Item {
    fn from(record: DeviceRecord) -> Self {
        let model: Model = present(record.model)
            .map(|name| Model::from_name(&name))
            .unwrap_or_default();
        let manufacturer: Manufacturer = match present(record.manufacturer) {
            Some(name) => Manufacturer::from_name(&name),
            None => model.manufacturer(),
        };

        Item {
            remote_id: present(record.remote_id),
            mac_address: parse_field(record.mac_address, "mac_address", parse_mac),
            imei: parse_field(record.imei, "imei", str::parse),
            imsi: parse_field(record.imsi, "imsi", str::parse),
            serial_number: present(record.serial_number),
            product_id: present(record.product_id),
            info: present(record.info),
            apn: present(record.apn),
            vendor: None,
            ipv4: parse_field(record.ipv4, "ipv4", parse_ipv4),
            model,
            manufacturer,
            linked_to_account: record.linked_to_account,
            account: record.account.map(Account::from),
        }
    }
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Account {
            remote_id: present(record.remote_id),
            name: present(record.name).map(AccountName::new),
            address: record.address.map(ServiceAddress::from),
        }
    }
}

impl From<AddressRecord> for ServiceAddress {
    fn from(record: AddressRecord) -> Self {
        ServiceAddress {
            remote_id: present(record.remote_id),
            line1: present(record.line1),
            line2: present(record.line2),
            city: present(record.city),
            zip_code: present(record.zip_code),
        }
    }
}
