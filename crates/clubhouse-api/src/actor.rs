//! The acting user, taken from the `x-user-id` header.
//!
//! Authentication happens upstream; this layer trusts whatever identity the
//! fronting proxy forwards and only insists that one is present.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

/// The opaque id of the user making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(USER_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(|v| Actor(v.to_owned()))
      .ok_or(ApiError::Unauthorized)
  }
}
