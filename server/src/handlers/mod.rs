//! Request handlers for counter operations.

mod auth;
mod click;
mod stats;

pub use auth::*;
pub use click::*;
pub use stats::*;

use std::time::Duration;

use tally_engine::{Count, UserId};

use crate::db::RemoteStoreError;
use crate::sync::RemoteCounters;

/// Merged count for a user, bounded by `remote_timeout`. Absent rows read as 0.
async fn merged_count(
    remote: &dyn RemoteCounters,
    remote_timeout: Duration,
    user_id: UserId,
) -> Result<Count, RemoteStoreError> {
    let count = tokio::time::timeout(remote_timeout, remote.get_count(user_id))
        .await
        .map_err(|_| RemoteStoreError::Timeout(remote_timeout))??;
    Ok(count.unwrap_or(0))
}

/// Like [`merged_count`], but an unreachable remote counts as 0 so the
/// local write still gets acknowledged.
async fn merged_count_or_zero(
    remote: &dyn RemoteCounters,
    remote_timeout: Duration,
    user_id: UserId,
) -> Count {
    match merged_count(remote, remote_timeout, user_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(
                user_id,
                error = %e,
                "Remote count unavailable, reporting staged clicks only"
            );
            0
        }
    }
}
