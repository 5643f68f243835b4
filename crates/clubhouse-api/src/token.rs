//! Chat session tokens and the `POST /stream/token` handler.
//!
//! Tokens are HS256 JWTs with `{sub, iat, exp}` claims. The messaging
//! backend shares the secret and validates them the same way
//! [`TokenIssuer::verify`] does.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
  errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{actor::Actor, error::ApiError};

/// JWT claims for chat session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
  pub sub: String, // user_id
  pub iat: i64,    // issued at (unix timestamp)
  pub exp: i64,    // expiry (unix timestamp)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
  #[error("malformed token")]
  Malformed,
  #[error("bad signature")]
  BadSignature,
  #[error("token expired")]
  Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
  fn from(e: jsonwebtoken::errors::Error) -> Self {
    match e.kind() {
      ErrorKind::ExpiredSignature => TokenError::Expired,
      ErrorKind::InvalidSignature => TokenError::BadSignature,
      _ => TokenError::Malformed,
    }
  }
}

pub struct TokenIssuer {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl:      Duration,
}

impl TokenIssuer {
  pub fn new(secret: &str, ttl: Duration) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl,
    }
  }

  /// Sign a token for `user_id`, valid from `now` for the issuer's ttl.
  pub fn issue(
    &self,
    user_id: &str,
    now: DateTime<Utc>,
  ) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = TokenClaims {
      sub: user_id.to_string(),
      iat: now.timestamp(),
      exp: (now + self.ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
  }

  /// Check signature and expiry against the system clock.
  pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<TokenClaims>(token, &self.decoding, &validation)?;
    Ok(data.claims)
  }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
  pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
  pub token: String,
}

/// `POST /stream/token`: body `{"userId":"..."}`, which must name the caller.
pub async fn handler(
  State(issuer): State<Arc<TokenIssuer>>,
  Actor(actor): Actor,
  Json(body): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
  let user_id = body.user_id.trim();
  if user_id.is_empty() {
    return Err(ApiError::BadRequest("userId must not be empty".into()));
  }
  if user_id != actor {
    return Err(ApiError::Forbidden(format!("{actor} may not request a token for {user_id}")));
  }

  let token = issuer
    .issue(user_id, Utc::now())
    .map_err(|e| ApiError::Unavailable(format!("token signing failed: {e}")))?;
  debug!(user_id, "issued chat token");
  Ok(Json(TokenResponse { token }))
}
