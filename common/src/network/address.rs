//! IPv4 interface addresses (address plus prefix).
//!
//! Observations arrive as bare addresses (`10.0.0.5`) while assignment stores hold
//! subnets (`10.0.0.5/32`). Both are normalised into an [`Ipv4Network`] whose `ip()` is
//! the host address itself, never the network address.

use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

use crate::identity::IdentityError;

/// Prefix used when an address is given without one.
pub const HOST_PREFIX: u8 = 32;

/// Builds a host address with an explicit prefix.
pub fn host_network(addr: Ipv4Addr, prefix: u8) -> Result<Ipv4Network, IdentityError> {
    Ipv4Network::new(addr, prefix).map_err(|_| IdentityError::InvalidAddress(format!("{addr}/{prefix}")))
}

/// Parses `a.b.c.d` or `a.b.c.d/p`.
pub fn parse_ipv4(s: &str) -> Result<Ipv4Network, IdentityError> {
    let s = s.trim();
    let invalid = || IdentityError::InvalidAddress(s.to_string());

    let (addr_str, prefix) = match s.split_once('/') {
        Some((addr_str, prefix_str)) => {
            let prefix: u8 = prefix_str.trim().parse().map_err(|_| invalid())?;
            (addr_str, prefix)
        }
        None => (s, HOST_PREFIX),
    };

    let addr: Ipv4Addr = addr_str.trim().parse().map_err(|_| invalid())?;
    Ipv4Network::new(addr, prefix).map_err(|_| invalid())
}

/// Renders the address as `a.b.c.d/p`.
pub fn format_ipv4(net: &Ipv4Network) -> String {
    format!("{}/{}", net.ip(), net.prefix())
}

/// Serde adapter storing an [`Ipv4Network`] as its `a.b.c.d/p` string.
pub mod serde_ipv4 {
    use pnet::ipnetwork::Ipv4Network;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(net: &Ipv4Network, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_ipv4(net))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Ipv4Network, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_ipv4(&s).map_err(serde::de::Error::custom)
    }
}
