use std::collections::HashSet;
use std::fmt;

use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;

use super::{Account, Imei, Imsi};
use crate::merge_set::{Identifiable, MergeConflict};
use crate::network::mac::{display_mac, parse_mac};

/// Hardware families known to the inventory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    Od06,
    Bec6500,
    Bec6900,
    Bec7000,
    T12000,
    T12300,
    Wac104,
    #[default]
    Unknown,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Manufacturer {
    Baicells,
    Telrad,
    Bec,
    Netgear,
    #[default]
    Unknown,
}

impl Model {
    /// Maps an inventory model name (as typed in the billing system) to a model.
    pub fn from_name(name: &str) -> Self {
        let name: String = name.trim().to_ascii_lowercase();
        if name.contains("od06") {
            Model::Od06
        } else if name.contains("7000") {
            Model::Bec7000
        } else if name.contains("6900") {
            Model::Bec6900
        } else if name.contains("6500") {
            Model::Bec6500
        } else if name.contains("12300") {
            Model::T12300
        } else if name.contains("12000") {
            Model::T12000
        } else if name.contains("wac104") {
            Model::Wac104
        } else {
            Model::Unknown
        }
    }

    pub fn manufacturer(&self) -> Manufacturer {
        match self {
            Model::Od06 => Manufacturer::Baicells,
            Model::Bec6500 | Model::Bec6900 | Model::Bec7000 => Manufacturer::Bec,
            Model::T12000 | Model::T12300 => Manufacturer::Telrad,
            Model::Wac104 => Manufacturer::Netgear,
            Model::Unknown => Manufacturer::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Od06 => "OD06",
            Model::Bec6500 => "RidgeWave 6500",
            Model::Bec6900 => "RidgeWave 6900",
            Model::Bec7000 => "RidgeWave 7000",
            Model::T12000 => "12000 Series",
            Model::T12300 => "12300 Series",
            Model::Wac104 => "WAC104",
            Model::Unknown => "Unknown Device Type",
        }
    }
}

impl Manufacturer {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "baicells" => Manufacturer::Baicells,
            "telrad" => Manufacturer::Telrad,
            "bec" | "bec technologies" => Manufacturer::Bec,
            "netgear" => Manufacturer::Netgear,
            _ => Manufacturer::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Manufacturer::Baicells => "Baicells",
            Manufacturer::Telrad => "Telrad",
            Manufacturer::Bec => "BEC",
            Manufacturer::Netgear => "Netgear",
            Manufacturer::Unknown => "Unknown",
        }
    }
}

/// One identifying value of a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceKey {
    RemoteId(String),
    Mac(MacAddr),
    Imei(Imei),
    Imsi(Imsi),
}

impl DeviceKey {
    /// Every key a free-form device identifier could stand for, most specific first.
    ///
    /// Session feeds report IMSIs, management systems report IMEIs or MACs, and the
    /// billing system reports its own ids. A 15 digit string is tried as an IMSI before
    /// it is tried as an IMEI.
    pub fn candidates(device_id: &str) -> Vec<DeviceKey> {
        let device_id: &str = device_id.trim();
        let mut keys: Vec<DeviceKey> = Vec::with_capacity(4);

        if let Ok(imsi) = device_id.parse::<Imsi>() {
            keys.push(DeviceKey::Imsi(imsi));
        }
        if let Ok(imei) = device_id.parse::<Imei>() {
            keys.push(DeviceKey::Imei(imei));
        }
        if let Ok(mac) = parse_mac(device_id) {
            keys.push(DeviceKey::Mac(mac));
        }
        if !device_id.is_empty() {
            keys.push(DeviceKey::RemoteId(device_id.to_string()));
        }
        keys
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKey::RemoteId(id) => write!(f, "id:{id}"),
            DeviceKey::Mac(mac) => write!(f, "mac:{}", display_mac(mac)),
            DeviceKey::Imei(imei) => write!(f, "imei:{imei}"),
            DeviceKey::Imsi(imsi) => write!(f, "imsi:{imsi}"),
        }
    }
}

/// An inventory item: one physical device as seen by any of the sources.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Item {
    /// Id of the inventory record in the billing system.
    pub remote_id: Option<String>,
    pub mac_address: Option<MacAddr>,
    pub imei: Option<Imei>,
    pub imsi: Option<Imsi>,
    pub serial_number: Option<String>,
    pub product_id: Option<String>,
    /// Free-form description, usually the SNMP `sysDescr` or the web UI banner.
    pub info: Option<String>,
    pub apn: Option<String>,
    /// Vendor name from the MAC OUI database.
    pub vendor: Option<String>,
    /// Last observed address.
    pub ipv4: Option<Ipv4Network>,
    pub model: Model,
    pub manufacturer: Manufacturer,
    pub linked_to_account: bool,
    pub account: Option<Account>,
}

impl Item {
    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac_address = Some(mac);
        self
    }

    pub fn with_imei(mut self, imei: Imei) -> Self {
        self.imei = Some(imei);
        self
    }

    pub fn with_imsi(mut self, imsi: Imsi) -> Self {
        self.imsi = Some(imsi);
        self
    }

    pub fn with_ipv4(mut self, net: Ipv4Network) -> Self {
        self.ipv4 = Some(net);
        self
    }

    /// Sets the model and the manufacturer it implies.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self.manufacturer = model.manufacturer();
        self
    }
}

impl Identifiable for Item {
    type Key = DeviceKey;

    fn key(&self) -> HashSet<DeviceKey> {
        let mut key: HashSet<DeviceKey> = HashSet::with_capacity(4);
        if let Some(id) = &self.remote_id {
            key.insert(DeviceKey::RemoteId(id.clone()));
        }
        if let Some(mac) = self.mac_address {
            key.insert(DeviceKey::Mac(mac));
        }
        if let Some(imei) = &self.imei {
            key.insert(DeviceKey::Imei(imei.clone()));
        }
        if let Some(imsi) = &self.imsi {
            key.insert(DeviceKey::Imsi(imsi.clone()));
        }
        key
    }

    fn absorb(&mut self, incoming: Item) -> Vec<MergeConflict> {
        let mut conflicts: Vec<MergeConflict> = Vec::new();

        macro_rules! overwrite {
            ($($field:ident),+ $(,)?) => {
                $(
                    if incoming.$field.is_some() {
                        self.$field = incoming.$field;
                    }
                )+
            };
        }

        overwrite!(
            remote_id,
            mac_address,
            imei,
            imsi,
            serial_number,
            product_id,
            info,
            apn,
            vendor,
            ipv4,
        );

        if incoming.model != Model::Unknown {
            self.model = incoming.model;
        }
        if incoming.manufacturer != Manufacturer::Unknown {
            self.manufacturer = incoming.manufacturer;
        }
        self.linked_to_account |= incoming.linked_to_account;

        if let Some(theirs) = incoming.account {
            match self.account.as_mut() {
                None => self.account = Some(theirs),
                Some(mine) => {
                    let anonymous: bool = mine.key().is_empty() || theirs.key().is_empty();
                    if anonymous || mine.shares_identity(&theirs) {
                        conflicts.extend(mine.absorb(theirs));
                    } else {
                        conflicts.push(MergeConflict::new(
                            "account",
                            format!("item belongs to {mine} but {theirs} was assigned"),
                        ));
                    }
                }
            }
        }

        conflicts
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.key().iter().map(|k| k.to_string()).collect();
        keys.sort();
        write!(f, "Inventory item [{}]", keys.join(", "))
    }
}
