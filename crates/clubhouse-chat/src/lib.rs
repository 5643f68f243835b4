//! Chat sessions over an external messaging backend.
//!
//! - [`backend`]: the traits a messaging backend implements and the
//!   selector that names a channel.
//! - [`identity`]: [`ChatIdentity`], the owned context holding the one
//!   connected client for the logged-in user.
//! - [`session`]: [`ChatSession`], which opens, watches, and releases a
//!   channel as its parameters change.
//! - [`token`]: exchange of a user id for a backend session token.

#![allow(async_fn_in_trait)]

pub mod backend;
pub mod error;
pub mod identity;
pub mod session;
pub mod token;

#[cfg(test)]
mod fake;

pub use error::{ChatError, Result};
pub use identity::{ChatIdentity, Connection};
pub use session::{ChatSession, SessionState};
