//! # Tally Engine
//!
//! The pure core of Tally: per-user click counters, init-data verification
//! and the value types that describe one reconciliation pass between the
//! local staging table and the remote table.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches a database, socket or clock
//! - **Deterministic**: same inputs always produce the same outputs
//! - **Testable**: pure functions, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Counters
//!
//! A [`CounterRecord`] exists independently in the local and the remote
//! table. The true total for a user is `remote.count + local.count`: the
//! local row only holds clicks that have not been folded into the remote
//! row yet.
//!
//! ### Init-data verification
//!
//! [`signature::verify`] checks that a web app init-data query string was
//! signed with the bot token. [`signature::verify_and_extract_user`] returns
//! the [`UserSession`] on success.
//!
//! ### Reconciliation
//!
//! A tick snapshots the top-N local rows, merges each into the remote table
//! by addition and then settles the local rows. A [`Settlement`] decides how
//! a local row is settled given its current count, so a click that lands
//! between snapshot and settlement is never dropped.
//!
//! ## Quick Start
//!
//! ```rust
//! use tally_engine::signature::{sign_init_data, verify_and_extract_user};
//!
//! let raw = sign_init_data(&[("id", "7"), ("username", "bob")], b"S");
//! let session = verify_and_extract_user(&raw, b"S").unwrap();
//! assert_eq!(session.user_id, 7);
//! assert_eq!(session.display_name, "bob");
//! ```

pub mod error;
pub mod reconcile;
pub mod record;
pub mod signature;

// Re-export main types at crate root
pub use error::Error;
pub use reconcile::{
    MergeFailure, RemovalReport, RowAction, Settlement, SyncPhase, TickReport, DEFAULT_BATCH_SIZE,
};
pub use record::{rank_by_count, CounterRecord, LeaderboardEntry, UserSession};
pub use signature::{UserClaims, Verification};

/// Type aliases for clarity
pub type UserId = i64;
pub type Count = i64;
