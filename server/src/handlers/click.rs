//! Click handler - stages one click in the local table.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_engine::{Count, UserId};

use super::merged_count_or_zero;
use crate::db::LocalStore;
use crate::error::{AppError, Result};
use crate::sync::RemoteCounters;

/// Request body for a click.
#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub user_id: UserId,
}

/// Acknowledgement for a click.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClickResponse {
    pub status: String,
    /// Merged plus staged clicks, including this one
    pub clicks: Count,
}

/// Record a click. Acknowledged once the local write succeeded.
pub async fn record_click(
    local: &LocalStore,
    remote: &dyn RemoteCounters,
    remote_timeout: Duration,
    request: ClickRequest,
) -> Result<ClickResponse> {
    if request.user_id <= 0 {
        return Err(AppError::BadRequest(format!(
            "Invalid user id: {}",
            request.user_id
        )));
    }

    let staged = local.increment(request.user_id).await?;
    let clicks = staged + merged_count_or_zero(remote, remote_timeout, request.user_id).await;
    tracing::debug!(user_id = request.user_id, staged, clicks, "Click staged");

    Ok(ClickResponse {
        status: "ok".to_string(),
        clicks,
    })
}
