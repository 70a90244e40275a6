//! Background reconciliation of the local staging table into the remote table.
//!
//! The [`Reconciler`] only depends on the two store traits below, so tests
//! can drive it against an in-memory remote.

mod reconciler;

pub use reconciler::*;

use std::sync::Arc;

use async_trait::async_trait;
use tally_engine::{Count, CounterRecord, RemovalReport, Settlement, UserId};

use crate::db::{LocalStoreError, RemoteStoreError};

/// The local table as seen by the reconciler.
#[async_trait]
pub trait LocalCounters: Send + Sync {
    /// Up to `n` rows, highest count first, ties by user id.
    async fn top_n(&self, n: usize) -> Result<Vec<CounterRecord>, LocalStoreError>;

    /// Settle merged rows without dropping clicks that arrived since the snapshot.
    async fn remove(&self, settlements: &[Settlement]) -> Result<RemovalReport, LocalStoreError>;
}

/// The remote table.
#[async_trait]
pub trait RemoteCounters: Send + Sync {
    async fn get_count(&self, user_id: UserId) -> Result<Option<Count>, RemoteStoreError>;

    /// Add `delta` to the user's total, creating the row if absent.
    ///
    /// Returns only after the write is durable.
    async fn merge_add(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
        delta: Count,
    ) -> Result<Count, RemoteStoreError>;
}

#[async_trait]
impl<T: RemoteCounters + ?Sized> RemoteCounters for Arc<T> {
    async fn get_count(&self, user_id: UserId) -> Result<Option<Count>, RemoteStoreError> {
        (**self).get_count(user_id).await
    }

    async fn merge_add(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
        delta: Count,
    ) -> Result<Count, RemoteStoreError> {
        (**self).merge_add(user_id, display_name, delta).await
    }
}
