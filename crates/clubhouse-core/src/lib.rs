//! Core types and trait definitions for Clubhouse.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the club model, the store abstraction, and the membership logic layered
//! on top of it. All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod club;
pub mod error;
pub mod membership;
pub mod memory;
pub mod registry;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
