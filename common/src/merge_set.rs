//! # Identity-Merging Collection
//!
//! [`MergeSet`] deduplicates partial records that arrive from independent sources.
//! Inserting an entity whose key shares any value with a stored entry folds the two
//! together, and keeps folding as long as the grown key reaches further entries.
//!
//! ## Invariants
//! * No two stored entries have intersecting keys.
//! * A stored entry is the union of every intersecting entity ever inserted, later
//!   insertions winning field by field.
//!
//! The whole scan-remove-merge-insert sequence runs under one mutex, so concurrent
//! fetch workers can call [`MergeSet::add`] freely.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

/// A single field that could not be copied during a merge.
///
/// The field keeps its previous value and the merge carries on with the others.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot merge field `{field}`: {reason}")]
pub struct MergeConflict {
    pub field: &'static str,
    pub reason: String,
}

impl MergeConflict {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// An entity kind that can live in a [`MergeSet`].
pub trait Identifiable: Clone + fmt::Debug {
    type Key: Clone + Eq + Hash + fmt::Debug;

    /// The set of non-null identifying values of this entity.
    fn key(&self) -> HashSet<Self::Key>;

    /// Copies every non-null field of `incoming` over the fields of `self`.
    ///
    /// Fields that cannot be copied are left untouched and reported.
    fn absorb(&mut self, incoming: Self) -> Vec<MergeConflict>;

    /// Whether both entities denote the same thing (their keys intersect).
    fn shares_identity(&self, other: &Self) -> bool {
        !self.key().is_disjoint(&other.key())
    }
}

struct Entry<T: Identifiable> {
    key: HashSet<T::Key>,
    value: T,
    /// Insertion order; a merged entry takes a fresh one.
    seq: u64,
}

struct Entries<T: Identifiable> {
    list: Vec<Entry<T>>,
    next_seq: u64,
}

impl<T: Identifiable> Entries<T> {
    fn push(&mut self, value: T) {
        let seq: u64 = self.next_seq;
        self.next_seq += 1;
        self.list.push(Entry {
            key: value.key(),
            value,
            seq,
        });
    }

    /// Removes every entry transitively reachable from `key`, oldest first.
    fn take_reachable(&mut self, key: &HashSet<T::Key>) -> Vec<Entry<T>> {
        let mut reach: HashSet<T::Key> = key.clone();
        let mut taken: Vec<Entry<T>> = Vec::new();

        while let Some(idx) = self.list.iter().position(|entry| !entry.key.is_disjoint(&reach)) {
            let entry: Entry<T> = self.list.swap_remove(idx);
            reach.extend(entry.key.iter().cloned());
            taken.push(entry);
        }

        taken.sort_by_key(|entry| entry.seq);
        taken
    }
}

/// Concurrency-safe collection merging entities by overlapping identity keys.
pub struct MergeSet<T: Identifiable> {
    entries: Mutex<Entries<T>>,
}

impl<T: Identifiable> Default for MergeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identifiable> MergeSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                list: Vec::new(),
                next_seq: 0,
            }),
        }
    }

    /// Inserts `entity`, merging it with every entry it transitively overlaps.
    ///
    /// Returns the canonical (possibly merged) entry as stored.
    /// An entity without any identifier is stored as is, since nothing can match it.
    pub fn add(&self, entity: T) -> T {
        let mut entries = self.lock();

        if entity.key().is_empty() {
            debug!(?entity, "unidentifiable record, storing without merge");
            entries.push(entity.clone());
            return entity;
        }

        let merged: T = merge_into(&mut entries, entity);
        entries.push(merged.clone());
        merged
    }

    /// Adds every entity from `iter`, one at a time.
    pub fn extend(&self, iter: impl IntoIterator<Item = T>) {
        for entity in iter {
            self.add(entity);
        }
    }

    /// `true` if a stored entry shares at least one key value with `entity`.
    pub fn contains(&self, entity: &T) -> bool {
        let key = entity.key();
        self.lock().list.iter().any(|entry| !entry.key.is_disjoint(&key))
    }

    /// Returns a copy of the entry whose key holds `value`.
    pub fn find(&self, value: &T::Key) -> Option<T> {
        self.lock()
            .list
            .iter()
            .find(|entry| entry.key.contains(value))
            .map(|entry| entry.value.clone())
    }

    /// Mutates the entry whose key holds `value` in place.
    ///
    /// If the mutation grew the key into other entries, they are merged as by
    /// [`MergeSet::add`], the mutated entry taking precedence. Returns `false` when no
    /// entry holds `value`.
    pub fn update(&self, value: &T::Key, f: impl FnOnce(&mut T)) -> bool {
        let mut entries = self.lock();

        let Some(idx) = entries.list.iter().position(|entry| entry.key.contains(value)) else {
            return false;
        };

        let entry: &mut Entry<T> = &mut entries.list[idx];
        f(&mut entry.value);

        let key: HashSet<T::Key> = entry.value.key();
        if key == entry.key {
            return true;
        }

        let Entry { value: target, .. } = entries.list.swap_remove(idx);
        let merged: T = merge_into(&mut entries, target);
        entries.push(merged);
        true
    }

    /// Copies of all stored entries, in no particular order.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().list.iter().map(|entry| entry.value.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().list.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Identifiable> FromIterator<T> for MergeSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Identifiable> fmt::Debug for MergeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

/// Pulls every entry reachable from `incoming`'s key out of `entries` and folds them
/// into one value, oldest first and `incoming` last. `entries` no longer contains any
/// of them afterwards.
fn merge_into<T: Identifiable>(entries: &mut Entries<T>, incoming: T) -> T {
    let mut reachable = entries.take_reachable(&incoming.key()).into_iter();

    let Some(Entry { value: mut merged, .. }) = reachable.next() else {
        info!(key = ?incoming.key(), "adding new record");
        return incoming;
    };

    for newer in reachable {
        debug!(key = ?newer.key, "cascading merge of overlapping record");
        apply(&mut merged, newer.value);
    }
    apply(&mut merged, incoming);

    info!(key = ?merged.key(), "merged record");
    merged
}

fn apply<T: Identifiable>(target: &mut T, incoming: T) {
    for conflict in target.absorb(incoming) {
        warn!(key = ?target.key(), "{conflict}, keeping existing value");
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
