//! Counter tables: the local SQLite staging table and the remote PostgreSQL table.

mod error;
mod local;
mod locks;
mod remote;

pub use error::*;
pub use local::*;
pub use locks::*;
pub use remote::*;
