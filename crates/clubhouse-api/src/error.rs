//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("missing user identity")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store unavailable: {0}")]
  Unavailable(String),
}

impl From<clubhouse_core::Error> for ApiError {
  fn from(e: clubhouse_core::Error) -> Self {
    use clubhouse_core::Error as E;
    match e {
      E::ClubNotFound(id) => ApiError::NotFound(format!("club {id} not found")),
      E::NotAuthorized { .. } => ApiError::Forbidden(e.to_string()),
      E::StoreRejected(m) => ApiError::Conflict(m),
      E::StoreUnavailable(m) => ApiError::Unavailable(m),
      E::Serialization(e) => ApiError::BadRequest(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
