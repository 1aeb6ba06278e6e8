use pnet::util::MacAddr;

use fleetr_common::network::mac;

/// Resolves device manufacturers from MAC addresses.
pub trait VendorRepository: Send + Sync {
    /// The vendor name owning the OUI of `mac`, `None` if the OUI is unknown.
    fn get_vendor(&self, mac: MacAddr) -> Option<String>;
}

/// Vendor lookup backed by the bundled OUI database.
pub struct MacOuiRepo;

impl VendorRepository for MacOuiRepo {
    fn get_vendor(&self, mac: MacAddr) -> Option<String> {
        mac::get_vendor(mac)
    }
}
