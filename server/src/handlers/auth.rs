//! Auth handler - verifies init data and registers the user locally.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_engine::{signature, Count, UserId};

use super::merged_count_or_zero;
use crate::db::LocalStore;
use crate::error::Result;
use crate::sync::RemoteCounters;

/// Request body for auth.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    /// Signed init-data query string as handed to the web app
    pub init_data: String,
}

/// Response for auth.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub user_id: UserId,
    /// Merged plus staged clicks
    pub clicks: Count,
}

/// Verify the payload and make sure the user has a local row.
pub async fn handle_auth(
    local: &LocalStore,
    remote: &dyn RemoteCounters,
    remote_timeout: Duration,
    bot_token: &str,
    request: AuthRequest,
) -> Result<AuthResponse> {
    let session = signature::verify_and_extract_user(&request.init_data, bot_token.as_bytes())?;
    let staged = local
        .read_or_init(session.user_id, &session.display_name)
        .await?;
    let clicks = staged + merged_count_or_zero(remote, remote_timeout, session.user_id).await;

    tracing::info!(user_id = session.user_id, staged, clicks, "User authenticated");

    Ok(AuthResponse {
        user_id: session.user_id,
        clicks,
    })
}
