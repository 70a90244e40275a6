//! Tally Server - click counters staged locally and reconciled into a remote table.
//!
//! Clicks are written to a local SQLite table without any network round
//! trip. A background [`sync::Reconciler`] periodically folds the staged
//! counts into the remote PostgreSQL table by addition.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sync;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::LocalStore;
use crate::sync::{RemoteCounters, SharedSyncStatus};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub local: LocalStore,
    pub remote: Arc<dyn RemoteCounters>,
    pub config: Arc<Config>,
    pub sync_status: SharedSyncStatus,
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
