//! SQLite backend for the Clubhouse club store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Patches are applied inside a single
//! transaction, and every accepted write republishes the full club list to
//! live subscribers.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
