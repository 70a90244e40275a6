//! Counter endpoint routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tally_engine::LeaderboardEntry;

use crate::auth::VerifiedUser;
use crate::error::Result;
use crate::handlers::{
    handle_auth, handle_user_totals, list_leaderboard, record_click, AuthRequest, AuthResponse,
    ClickRequest, ClickResponse, UserTotals,
};
use crate::AppState;

/// Create counter routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth", post(auth_handler))
        .route("/api/click", post(click_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/me", get(me_handler))
}

/// POST /api/auth - Verify init data and register the user.
async fn auth_handler(
    State(state): State<AppState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<AuthResponse>> {
    let response = handle_auth(
        &state.local,
        state.remote.as_ref(),
        state.config.remote_timeout,
        &state.config.bot_token,
        request,
    )
    .await?;
    Ok(Json(response))
}

/// POST /api/click - Stage one click.
async fn click_handler(
    State(state): State<AppState>,
    Json(request): Json<ClickRequest>,
) -> Result<Json<ClickResponse>> {
    let response = record_click(
        &state.local,
        state.remote.as_ref(),
        state.config.remote_timeout,
        request,
    )
    .await?;
    Ok(Json(response))
}

/// GET /api/stats - Leaderboard of staged clicks.
async fn stats_handler(State(state): State<AppState>) -> Result<Json<Vec<LeaderboardEntry>>> {
    let response = list_leaderboard(&state.local).await?;
    Ok(Json(response))
}

/// GET /api/me - Totals for the authenticated user.
async fn me_handler(
    State(state): State<AppState>,
    VerifiedUser(session): VerifiedUser,
) -> Result<Json<UserTotals>> {
    let response = handle_user_totals(
        &state.local,
        state.remote.as_ref(),
        state.config.remote_timeout,
        session.user_id,
    )
    .await?;
    Ok(Json(response))
}
