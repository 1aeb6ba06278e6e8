//! Cellular subscriber and equipment identifiers.

use std::fmt;
use std::str::FromStr;

use super::IdentityError;

/// International Mobile Equipment Identity, 15 digits (16 for IMEISV).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Imei(String);

/// International Mobile Subscriber Identity, always 15 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Imsi(String);

impl FromStr for Imei {
    type Err = IdentityError;

    /// Dashes used by some management UIs (`35-209900-176148-1`) are stripped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.trim().replace('-', "");
        let valid_len: bool = matches!(digits.len(), 15 | 16);
        if !valid_len || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdentityError::InvalidImei(s.to_string()));
        }
        Ok(Self(digits))
    }
}

impl FromStr for Imsi {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: &str = s.trim();
        if digits.len() != 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdentityError::InvalidImsi(s.to_string()));
        }
        Ok(Self(digits.to_string()))
    }
}

impl Imei {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Imsi {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Imei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
