use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::merge_set::{Identifiable, MergeConflict};

/// A subscriber name as typed by whoever created the record.
///
/// Equality uses a normalised form: case folded, whitespace collapsed,
/// `"Doe, Jane"` reordered to `"jane doe"` and `and` written as `&`.
#[derive(Debug, Clone)]
pub struct AccountName {
    raw: String,
    normalized: String,
}

impl AccountName {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw: String = raw.into();
        let normalized: String = normalize(&raw);
        Self { raw, normalized }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

impl PartialEq for AccountName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for AccountName {}

impl Hash for AccountName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn normalize(raw: &str) -> String {
    let lower: String = raw.trim().to_lowercase();
    let reordered: String = match lower.split_once(',') {
        Some((last, first)) => format!("{} {}", first.trim(), last.trim()),
        None => lower,
    };

    reordered
        .split_whitespace()
        .map(|word| if word == "and" { "&" } else { word })
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Service address of an account.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub remote_id: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

impl ServiceAddress {
    fn absorb(&mut self, incoming: ServiceAddress) {
        if incoming.remote_id.is_some() {
            self.remote_id = incoming.remote_id;
        }
        if incoming.line1.is_some() {
            self.line1 = incoming.line1;
        }
        if incoming.line2.is_some() {
            self.line2 = incoming.line2;
        }
        if incoming.city.is_some() {
            self.city = incoming.city;
        }
        if incoming.zip_code.is_some() {
            self.zip_code = incoming.zip_code;
        }
    }
}

/// One identifying value of an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountKey {
    RemoteId(String),
    Name(AccountName),
}

/// A subscriber account in the billing system.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Account {
    pub remote_id: Option<String>,
    pub name: Option<AccountName>,
    pub address: Option<ServiceAddress>,
}

impl Account {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(AccountName::new(name)),
            ..Self::default()
        }
    }
}

impl Identifiable for Account {
    type Key = AccountKey;

    fn key(&self) -> HashSet<AccountKey> {
        let mut key: HashSet<AccountKey> = HashSet::with_capacity(2);
        if let Some(id) = &self.remote_id {
            key.insert(AccountKey::RemoteId(id.clone()));
        }
        if let Some(name) = self.name.as_ref().filter(|name| !name.is_empty()) {
            key.insert(AccountKey::Name(name.clone()));
        }
        key
    }

    fn absorb(&mut self, incoming: Account) -> Vec<MergeConflict> {
        if incoming.remote_id.is_some() {
            self.remote_id = incoming.remote_id;
        }
        if incoming.name.is_some() {
            self.name = incoming.name;
        }
        if let Some(theirs) = incoming.address {
            match self.address.as_mut() {
                Some(mine) => mine.absorb(theirs),
                None => self.address = Some(theirs),
            }
        }
        Vec::new()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Account]")?;
        if let Some(id) = &self.remote_id {
            write!(f, " (id: {id})")?;
        }
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}
