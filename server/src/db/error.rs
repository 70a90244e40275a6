//! Store error types.

use std::time::Duration;

/// Failure of the local staging table.
///
/// Fatal for the request that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failure of the remote table.
///
/// Recoverable: the affected local row stays staged for the next tick.
#[derive(Debug, thiserror::Error)]
pub enum RemoteStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteStoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteStoreError::Timeout(_))
    }
}
