//! Exchange of a user id for a messaging-backend session token.

use std::{future::Future, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::SessionToken;

const USER_HEADER: &str = "x-user-id";

/// Issues backend session tokens for user ids.
pub trait TokenSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch_token<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<SessionToken, Self::Error>> + Send + 'a;
}

#[derive(Debug, Error)]
pub enum TokenError {
  #[error("token request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("token endpoint returned {0}")]
  Status(reqwest::StatusCode),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
  user_id: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
  token: String,
}

/// `POST {base_url}/stream/token` with `{"userId": ...}`, expecting
/// `{"token": ...}` back. The user id is also sent as the `x-user-id`
/// identity header, since the endpoint only issues tokens to the caller.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpTokenSource {
  client:   Client,
  endpoint: String,
}

impl HttpTokenSource {
  pub fn new(base_url: &str) -> Result<Self, TokenError> {
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
    Ok(Self {
      client,
      endpoint: format!("{}/stream/token", base_url.trim_end_matches('/')),
    })
  }

  pub fn endpoint(&self) -> &str { &self.endpoint }
}

impl TokenSource for HttpTokenSource {
  type Error = TokenError;

  async fn fetch_token(&self, user_id: &str) -> Result<SessionToken, TokenError> {
    let resp = self
      .client
      .post(&self.endpoint)
      .header(USER_HEADER, user_id)
      .json(&TokenRequest { user_id })
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(TokenError::Status(resp.status()));
    }
    let body: TokenResponse = resp.json().await?;
    Ok(SessionToken(body.token))
  }
}
