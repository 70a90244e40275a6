//! Shared test fixtures.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tally_engine::{Count, UserId};
use tally_server::db::{LocalStore, RemoteStoreError};
use tally_server::sync::RemoteCounters;

/// Open an in-memory local table with the schema in place.
pub async fn memory_local() -> LocalStore {
    let local = LocalStore::connect("sqlite::memory:").await.unwrap();
    local.ensure_schema().await.unwrap();
    local
}

/// Stage `clicks` clicks for a user.
pub async fn click(local: &LocalStore, user_id: UserId, clicks: usize) {
    for _ in 0..clicks {
        local.increment(user_id).await.unwrap();
    }
}

/// In-memory remote table with failure injection.
#[derive(Default)]
pub struct FakeRemote {
    rows: Mutex<HashMap<UserId, (Option<String>, Count)>>,
    failing: Mutex<HashSet<UserId>>,
    slow: Mutex<HashSet<UserId>>,
    click_during_merge: Mutex<Option<(UserId, LocalStore)>>,
    merge_calls: Mutex<Vec<(UserId, Count)>>,
    reads_fail: AtomicBool,
    reads_stall: AtomicBool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset(&self, user_id: UserId, count: Count) {
        self.rows.lock().unwrap().insert(user_id, (None, count));
    }

    pub fn fail_for(&self, user_id: UserId) {
        self.failing.lock().unwrap().insert(user_id);
    }

    pub fn recover(&self, user_id: UserId) {
        self.failing.lock().unwrap().remove(&user_id);
        self.slow.lock().unwrap().remove(&user_id);
    }

    /// Merges for this user never finish on their own.
    pub fn stall_for(&self, user_id: UserId) {
        self.slow.lock().unwrap().insert(user_id);
    }

    /// Every `get_count` returns an error.
    pub fn fail_reads(&self) {
        self.reads_fail.store(true, Ordering::SeqCst);
    }

    /// Every `get_count` hangs until the caller gives up.
    pub fn stall_reads(&self) {
        self.reads_stall.store(true, Ordering::SeqCst);
    }

    /// Stage one more local click while this user's merge is in flight.
    pub fn click_during_merge(&self, user_id: UserId, local: LocalStore) {
        *self.click_during_merge.lock().unwrap() = Some((user_id, local));
    }

    pub fn count(&self, user_id: UserId) -> Option<Count> {
        self.rows.lock().unwrap().get(&user_id).map(|(_, count)| *count)
    }

    pub fn display_name(&self, user_id: UserId) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&user_id)
            .and_then(|(name, _)| name.clone())
    }

    pub fn merge_calls(&self) -> Vec<(UserId, Count)> {
        self.merge_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteCounters for FakeRemote {
    async fn get_count(&self, user_id: UserId) -> Result<Option<Count>, RemoteStoreError> {
        if self.reads_stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.count(user_id))
    }

    async fn merge_add(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
        delta: Count,
    ) -> Result<Count, RemoteStoreError> {
        self.merge_calls.lock().unwrap().push((user_id, delta));

        if self.slow.lock().unwrap().contains(&user_id) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.lock().unwrap().contains(&user_id) {
            return Err(RemoteStoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let hook = self.click_during_merge.lock().unwrap().take();
        if let Some((hook_user, local)) = hook {
            if hook_user == user_id {
                local.increment(user_id).await.unwrap();
            } else {
                *self.click_during_merge.lock().unwrap() = Some((hook_user, local));
            }
        }

        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(user_id).or_insert((None, 0));
        row.1 += delta;
        if let Some(name) = display_name {
            row.0 = Some(name.to_string());
        }
        Ok(row.1)
    }
}
