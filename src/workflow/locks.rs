use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::types::ComplaintId;

type LockTable = HashMap<ComplaintId, Arc<AsyncMutex<()>>>;

/// Per-complaint mutation locks.
///
/// Mutations of one complaint are linearized; different complaints never
/// contend. Entries are dropped once the last lease for an id is released.
#[derive(Debug, Default, Clone)]
pub struct ComplaintLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Exclusive right to mutate one complaint. Released on drop.
#[derive(Debug)]
pub struct ComplaintLease {
    guard: Option<OwnedMutexGuard<()>>,
    id: ComplaintId,
    table: Arc<Mutex<LockTable>>,
}

impl ComplaintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &ComplaintId) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        table.entry(id.clone()).or_default().clone()
    }

    pub async fn acquire(&self, id: &ComplaintId) -> ComplaintLease {
        let guard = self.slot(id).lock_owned().await;
        ComplaintLease {
            guard: Some(guard),
            id: id.clone(),
            table: Arc::clone(&self.table),
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `wait`.
    pub async fn acquire_timeout(&self, id: &ComplaintId, wait: Duration) -> Option<ComplaintLease> {
        let lease = tokio::time::timeout(wait, self.acquire(id)).await.ok();
        if lease.is_none() {
            // The abandoned waiter may have left an orphan slot behind.
            self.prune(id);
        }
        lease
    }

    /// Number of complaint ids that currently have a slot.
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn prune(&self, id: &ComplaintId) {
        prune_slot(&self.table, id);
    }
}

fn prune_slot(table: &Mutex<LockTable>, id: &ComplaintId) {
    let mut table = table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    // Only the table holds the slot: nobody owns or waits on it.
    if table.get(id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
        table.remove(id);
    }
}

impl Drop for ComplaintLease {
    fn drop(&mut self) {
        // Release the async mutex first so the slot's strong count drops.
        self.guard.take();
        prune_slot(&self.table, &self.id);
    }
}
