//! Counter records and the views derived from them.

use crate::{Count, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Name shown for users that never reported one.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// One user's counter row, as held by either the local or the remote table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterRecord {
    /// Primary key
    pub user_id: UserId,
    /// Best-effort, last write wins
    pub display_name: Option<String>,
    /// Never negative
    pub count: Count,
}

impl CounterRecord {
    /// Create a record.
    pub fn new(user_id: UserId, display_name: Option<String>, count: Count) -> Self {
        Self {
            user_id,
            display_name,
            count,
        }
    }

    /// Display name with the fallback applied.
    pub fn display_name_or_unknown(&self) -> &str {
        self.display_name.as_deref().unwrap_or(UNKNOWN_DISPLAY_NAME)
    }

    /// Project into a leaderboard row.
    pub fn to_leaderboard_entry(&self) -> LeaderboardEntry {
        LeaderboardEntry {
            username: self.display_name_or_unknown().to_string(),
            clicks: self.count,
        }
    }
}

/// A row of the public stats listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub clicks: Count,
}

/// The authenticated identity extracted from verified init data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user_id: UserId,
    pub display_name: String,
}

/// Leaderboard order: count descending, ties by user id ascending.
///
/// The local table applies the same order in SQL
/// (`ORDER BY count DESC, user_id ASC`); this is the in-memory equivalent.
pub fn rank_by_count(a: &CounterRecord, b: &CounterRecord) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| a.user_id.cmp(&b.user_id))
}
