use std::sync::OnceLock;

use mac_oui::Oui;
use pnet::util::MacAddr;

use crate::identity::IdentityError;

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

/// Retrieves or initializes the **Organizationally unique identifier** database.
///
/// Used for linking a vendor to a device MAC address. A database that fails to load
/// is remembered as missing so the load is only attempted once.
fn get_oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::warn!("failed to load OUI database: {e:?}");
                None
            }
        })
        .as_ref()
}

/// Identify the vendor of a MAC address.
pub fn get_vendor(mac: MacAddr) -> Option<String> {
    let db = get_oui_db()?;
    let mac_str = mac.to_string();
    match db.lookup_by_mac(&mac_str) {
        Ok(Some(entry)) => Some(entry.company_name.clone()),
        _ => None,
    }
}

/// Parses a MAC address written with or without separators.
///
/// Accepts `AB:CD:EF:12:34:56`, `ab-cd-ef-12-34-56`, `abcd.ef12.3456` and `abcdef123456`.
pub fn parse_mac(s: &str) -> Result<MacAddr, IdentityError> {
    let digits: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();

    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IdentityError::InvalidMac(s.to_string()));
    }

    let mut octets = [0u8; 6];
    for (idx, octet) in octets.iter_mut().enumerate() {
        let pair: &str = &digits[idx * 2..idx * 2 + 2];
        *octet = u8::from_str_radix(pair, 16).map_err(|_| IdentityError::InvalidMac(s.to_string()))?;
    }

    Ok(MacAddr::new(octets[0], octets[1], octets[2], octets[3], octets[4], octets[5]))
}

/// Upper-case, colon separated rendering used in logs and reports.
pub fn display_mac(mac: &MacAddr) -> String {
    mac.to_string().to_ascii_uppercase()
}
