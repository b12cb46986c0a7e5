use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockTable = Arc<SyncMutex<HashMap<Uuid, Arc<Mutex<()>>>>>;

/// One async mutex per owner. Clones share the same table.
///
/// An owner's entry lives only while someone holds or waits for its lock.
#[derive(Clone, Default)]
pub struct OwnerLocks {
    locks: LockTable,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `owner_id`'s index; released when the guard drops.
    pub async fn acquire(&self, owner_id: Uuid) -> OwnerGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(owner_id).or_default().clone()
        };

        OwnerGuard {
            guard: Some(lock.lock_owned().await),
            owner_id,
            locks: self.locks.clone(),
        }
    }

    /// Owners with a held or awaited lock
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Exclusive access to one owner's index
pub struct OwnerGuard {
    guard: Option<OwnedMutexGuard<()>>,
    owner_id: Uuid,
    locks: LockTable,
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        self.guard.take();

        // waiters clone the Arc under the table lock, so a count of 1 means nobody is queued
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.owner_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.owner_id);
        }
    }
}
