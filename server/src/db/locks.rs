//! Per-row mutual exclusion for the local table.
//!
//! Every read-modify-write on a local row runs under that row's lock, so
//! concurrent clicks, auth calls and reconciliation never interleave on the
//! same user. Entries are dropped once nobody holds or waits for them.

use std::sync::Arc;

use dashmap::DashMap;
use tally_engine::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock registry keyed by user id.
#[derive(Debug, Default)]
pub struct RowLocks {
    rows: DashMap<UserId, Arc<Mutex<()>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    /// Wait for exclusive access to a row.
    pub async fn acquire(&self, user_id: UserId) -> RowGuard<'_> {
        let mutex = self.rows.entry(user_id).or_default().clone();
        let guard = mutex.lock_owned().await;

        RowGuard {
            locks: self,
            user_id,
            guard: Some(guard),
        }
    }

    /// Number of rows with a live lock entry.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Exclusive access to one row; released on drop.
#[derive(Debug)]
pub struct RowGuard<'a> {
    locks: &'a RowLocks,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the registry's own handle left: nobody holds or waits.
        self.locks
            .rows
            .remove_if(&self.user_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
