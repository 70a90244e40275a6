//! Stats handlers - leaderboard and per-user totals.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_engine::{Count, LeaderboardEntry, UserId};

use super::merged_count;
use crate::db::LocalStore;
use crate::error::Result;
use crate::sync::RemoteCounters;

/// A user's clicks split by where they currently live.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserTotals {
    pub user_id: UserId,
    /// Staged, not yet merged
    pub local: Count,
    /// Already merged into the remote table
    pub remote: Count,
    pub total: Count,
}

/// Staged counts, highest first. Reads the local table only.
pub async fn list_leaderboard(local: &LocalStore) -> Result<Vec<LeaderboardEntry>> {
    let records = local.list_all().await?;
    Ok(records.iter().map(|r| r.to_leaderboard_entry()).collect())
}

/// Sum the staged and merged counts for one user.
pub async fn handle_user_totals(
    local: &LocalStore,
    remote: &dyn RemoteCounters,
    remote_timeout: Duration,
    user_id: UserId,
) -> Result<UserTotals> {
    let local_count = local.get(user_id).await?.map(|r| r.count).unwrap_or(0);

    let remote_count = merged_count(remote, remote_timeout, user_id).await?;

    Ok(UserTotals {
        user_id,
        local: local_count,
        remote: remote_count,
        total: local_count + remote_count,
    })
}
