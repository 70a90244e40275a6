//! Error types for the Tally engine.

use thiserror::Error;

/// Reasons an init-data payload is rejected.
///
/// These are never retried: the caller answers with a rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("missing hash field")]
    MissingHash,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("invalid user claim: {0}")]
    InvalidUserClaim(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
