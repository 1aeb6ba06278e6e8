use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{info, warn};

use fleetr_common::attachment::Attachment;

use crate::ports::{AssignmentStore, StoreError};

/// How often each store operation was called.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Calls that would have changed the remote store.
    pub fn mutations(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Default)]
struct State {
    assignments: BTreeMap<u64, Attachment>,
    calls: CallCounts,
}

/// In-process assignment store. Remote ids are handed out sequentially.
///
/// Every mutating call is logged, so running the loop against it shows what would
/// be sent to a real store.
pub struct MemoryAssignmentStore {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl Default for MemoryAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAssignmentStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Starts from previously known assignments, e.g. a snapshot.
    pub fn seeded(assignments: Vec<Attachment>) -> Self {
        let store = Self::new();
        store.seed(assignments);
        store
    }

    /// Adds previously known assignments. Returns how many were stored.
    ///
    /// Numeric remote ids are kept; anything else is given a fresh id. Later ids
    /// continue after the highest one seen.
    pub fn seed(&self, assignments: Vec<Attachment>) -> usize {
        let max_id: u64 = assignments
            .iter()
            .filter_map(|a| a.remote_id.as_deref()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.next_id.fetch_max(max_id.saturating_add(1), Ordering::Relaxed);

        let mut state = self.lock();
        let mut stored: usize = 0;
        for attachment in assignments {
            let id: Option<u64> = match attachment.remote_id.as_deref().map(str::parse::<u64>) {
                Some(Ok(id)) => Some(id),
                _ => self.allocate_id(&state.assignments),
            };
            match id {
                Some(id) => {
                    state.assignments.insert(id, attachment.with_remote_id(id.to_string()));
                    stored += 1;
                }
                None => warn!("no remote id left for {attachment}, dropping it"),
            }
        }
        stored
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Current content, ordered by remote id.
    pub fn assignments(&self) -> Vec<Attachment> {
        self.lock().assignments.values().cloned().collect()
    }

    /// The next free id, or `None` once the id space is used up.
    fn allocate_id(&self, taken: &BTreeMap<u64, Attachment>) -> Option<u64> {
        let id: u64 = self.next_id.load(Ordering::Relaxed);
        if taken.contains_key(&id) {
            return None;
        }
        self.next_id.store(id.saturating_add(1), Ordering::Relaxed);
        Some(id)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn numeric_id(attachment: &Attachment, operation: &'static str) -> Result<u64, StoreError> {
    let raw: &str = attachment.remote_id.as_deref().ok_or_else(|| StoreError::Rejected {
        operation,
        reason: format!("{attachment} has no remote id"),
    })?;
    raw.parse().map_err(|_| StoreError::NotFound(raw.to_string()))
}

#[async_trait]
impl AssignmentStore for MemoryAssignmentStore {
    async fn list(&self) -> Result<Vec<Attachment>, StoreError> {
        let mut state = self.lock();
        state.calls.list += 1;
        Ok(state.assignments.values().cloned().collect())
    }

    async fn create(&self, attachment: Attachment) -> Result<Attachment, StoreError> {
        let mut state = self.lock();
        state.calls.create += 1;

        let id: u64 = self.allocate_id(&state.assignments).ok_or_else(|| StoreError::Rejected {
            operation: "create",
            reason: "remote ids exhausted".to_string(),
        })?;
        let created: Attachment = attachment.with_remote_id(id.to_string());
        info!("[dry-run] create {created}");
        state.assignments.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, attachment: Attachment) -> Result<Attachment, StoreError> {
        let mut state = self.lock();
        state.calls.update += 1;

        let id: u64 = numeric_id(&attachment, "update")?;
        let Some(slot) = state.assignments.get_mut(&id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        info!("[dry-run] update {attachment}");
        *slot = attachment.clone();
        Ok(attachment)
    }

    async fn delete(&self, attachment: &Attachment) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.delete += 1;

        let id: u64 = match numeric_id(attachment, "delete") {
            Ok(id) => id,
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        if state.assignments.remove(&id).is_some() {
            info!("[dry-run] delete {attachment}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetr_common::network::address::parse_ipv4;

    fn attachment(device: &str, ip: &str) -> Attachment {
        Attachment::new(device, parse_ipv4(ip).unwrap())
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryAssignmentStore::new();

        let a = store.create(attachment("12", "10.0.0.1")).await.unwrap();
        let b = store.create(attachment("13", "10.0.0.2")).await.unwrap();

        assert_eq!(a.remote_id.as_deref(), Some("1"));
        assert_eq!(b.remote_id.as_deref(), Some("2"));
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(store.calls().create, 2);
    }

    #[tokio::test]
    async fn seeding_continues_after_the_highest_id() {
        let store = MemoryAssignmentStore::seeded(vec![
            attachment("12", "10.0.0.1").with_remote_id("41"),
            attachment("13", "10.0.0.2"),
        ]);

        let ids: Vec<_> = store.assignments().into_iter().filter_map(|a| a.remote_id).collect();
        assert_eq!(ids, vec!["41", "42"]);

        let created = store.create(attachment("14", "10.0.0.3")).await.unwrap();
        assert_eq!(created.remote_id.as_deref(), Some("43"));
        assert_eq!(store.calls(), CallCounts { create: 1, ..CallCounts::default() });
    }

    #[tokio::test]
    async fn seeding_with_the_largest_id_does_not_wrap() {
        let top: String = u64::MAX.to_string();
        let store = MemoryAssignmentStore::seeded(vec![
            attachment("12", "10.0.0.1").with_remote_id(top.as_str()),
            attachment("13", "10.0.0.2"),
        ]);

        let ids: Vec<_> = store.assignments().into_iter().filter_map(|a| a.remote_id).collect();
        assert_eq!(ids, vec![top.clone()]);

        let result = store.create(attachment("14", "10.0.0.3")).await;
        assert!(matches!(result, Err(StoreError::Rejected { operation: "create", .. })));
        assert_eq!(store.assignments().len(), 1);
        assert_eq!(store.assignments()[0].device.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn update_of_missing_assignment_fails() {
        let store = MemoryAssignmentStore::new();

        let result = store.update(attachment("12", "10.0.0.1").with_remote_id("9")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        let result = store.update(attachment("12", "10.0.0.1")).await;
        assert!(matches!(result, Err(StoreError::Rejected { operation: "update", .. })));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryAssignmentStore::new();
        let created = store.create(attachment("12", "10.0.0.1")).await.unwrap();

        store.delete(&created).await.unwrap();
        store.delete(&created).await.unwrap();

        assert!(store.assignments().is_empty());
        assert_eq!(store.calls().delete, 2);
    }
}
