//! JSON REST API for Clubhouse.
//!
//! Exposes an axum [`Router`] backed by any [`clubhouse_core::store::ClubStore`].
//! Authentication, TLS, and transport concerns are the caller's
//! responsibility; the acting user arrives in the [`actor::USER_HEADER`]
//! header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(clubhouse_api::api_router(service, issuer))
//! ```

pub mod actor;
pub mod clubs;
pub mod error;
pub mod token;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use clubhouse_core::{membership::MembershipService, store::ClubStore};

pub use error::ApiError;
pub use token::TokenIssuer;

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: MembershipService<S>, tokens: Arc<TokenIssuer>) -> Router<()>
where
  S: ClubStore + 'static,
{
  let clubs = Router::new()
    .route("/clubs", get(clubs::list::<S>).post(clubs::create::<S>))
    .route(
      "/clubs/{id}",
      get(clubs::get_one::<S>)
        .patch(clubs::update::<S>)
        .delete(clubs::delete::<S>),
    )
    .route("/clubs/{id}/join", post(clubs::join::<S>))
    .route("/clubs/{id}/leave", post(clubs::leave::<S>))
    .route("/me/clubs", get(clubs::mine::<S>))
    .with_state(service);

  let stream = Router::new()
    .route("/stream/token", post(token::handler))
    .with_state(tokens);

  clubs.merge(stream)
}
