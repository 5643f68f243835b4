//! Async HTTP client wrapping the Clubhouse JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clubhouse_core::{club::Club, selector::Partition};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const USER_HEADER: &str = "x-user-id";

/// Connection settings for the Clubhouse API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub user_id:  String,
}

/// Body of `POST /clubs`.
#[derive(Debug, Serialize)]
pub struct CreateClub {
  pub name:        String,
  pub category:    String,
  pub description: String,
  pub tags:        Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub leader_name: Option<String>,
  pub private:     bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub capacity:    Option<u32>,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// Async HTTP client for the Clubhouse JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  pub fn base_url(&self) -> &str { self.config.base_url.trim_end_matches('/') }

  fn url(&self, path: &str) -> String { format!("{}{}", self.base_url(), path) }

  fn as_user(&self, req: RequestBuilder) -> Result<RequestBuilder> {
    if self.config.user_id.is_empty() {
      return Err(anyhow!("no user id; pass --user or set CLUBHOUSE_USER"));
    }
    Ok(req.header(USER_HEADER, &self.config.user_id))
  }

  /// Turn a non-2xx response into an error carrying the server's message.
  async fn check(what: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let detail = resp
      .json::<ErrorBody>()
      .await
      .map(|b| b.error)
      .unwrap_or_else(|_| status.to_string());
    Err(anyhow!("{what} → {status}: {detail}"))
  }

  // ── Clubs ─────────────────────────────────────────────────────────────────

  /// `GET /clubs`
  pub async fn list_clubs(&self) -> Result<Vec<Club>> {
    let resp = self
      .as_user(self.client.get(self.url("/clubs")))?
      .send()
      .await
      .context("GET /clubs failed")?;
    Self::check("GET /clubs", resp)
      .await?
      .json()
      .await
      .context("deserialising clubs")
  }

  /// `GET /me/clubs[?category=<c>&q=<text>]`
  pub async fn my_clubs(&self, category: Option<&str>, query: Option<&str>) -> Result<Partition> {
    let mut params = Vec::new();
    if let Some(c) = category {
      params.push(("category", c));
    }
    if let Some(q) = query {
      params.push(("q", q));
    }

    let resp = self
      .as_user(self.client.get(self.url("/me/clubs")))?
      .query(&params)
      .send()
      .await
      .context("GET /me/clubs failed")?;
    Self::check("GET /me/clubs", resp)
      .await?
      .json()
      .await
      .context("deserialising club partition")
  }

  /// `POST /clubs`
  pub async fn create_club(&self, body: &CreateClub) -> Result<Club> {
    let resp = self
      .as_user(self.client.post(self.url("/clubs")))?
      .json(body)
      .send()
      .await
      .context("POST /clubs failed")?;
    Self::check("POST /clubs", resp)
      .await?
      .json()
      .await
      .context("deserialising created club")
  }

  // ── Membership ────────────────────────────────────────────────────────────

  /// `POST /clubs/{id}/join`
  pub async fn join(&self, club_id: Uuid) -> Result<()> {
    self.post_action(club_id, "join").await
  }

  /// `POST /clubs/{id}/leave`
  pub async fn leave(&self, club_id: Uuid) -> Result<()> {
    self.post_action(club_id, "leave").await
  }

  async fn post_action(&self, club_id: Uuid, action: &str) -> Result<()> {
    let path = format!("/clubs/{club_id}/{action}");
    let resp = self
      .as_user(self.client.post(self.url(&path)))?
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;
    Self::check(&format!("POST {path}"), resp).await?;
    Ok(())
  }

  /// `DELETE /clubs/{id}`
  pub async fn delete(&self, club_id: Uuid) -> Result<()> {
    let path = format!("/clubs/{club_id}");
    let resp = self
      .as_user(self.client.delete(self.url(&path)))?
      .send()
      .await
      .with_context(|| format!("DELETE {path} failed"))?;
    Self::check(&format!("DELETE {path}"), resp).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
  };
  use serde_json::json;
  use tokio::net::TcpListener;

  use super::*;

  async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
  }

  fn client(base_url: &str, user: &str) -> ApiClient {
    ApiClient::new(ApiConfig { base_url: format!("{base_url}/"), user_id: user.into() }).unwrap()
  }

  #[tokio::test]
  async fn sends_user_header() {
    let router = Router::new().route(
      "/me/clubs",
      get(|headers: HeaderMap| async move {
        assert_eq!(headers.get("x-user-id").unwrap(), "u1");
        Json(json!({ "created": [], "joined": [], "joinable": [], "featured": [] }))
      }),
    );
    let base = serve(router).await;

    let p = client(&base, "u1").my_clubs(Some("Books"), None).await.unwrap();
    assert!(p.created.is_empty() && p.joinable.is_empty());
  }

  #[tokio::test]
  async fn error_body_is_surfaced() {
    let router = Router::new().route(
      "/clubs/{id}/join",
      post(|| async {
        (StatusCode::CONFLICT, Json(json!({ "error": "conflict: club is full (capacity 2)" })))
      }),
    );
    let base = serve(router).await;

    let err = client(&base, "u3").join(Uuid::new_v4()).await.unwrap_err();
    assert!(err.to_string().contains("club is full"), "{err}");
  }

  #[tokio::test]
  async fn missing_user_fails_before_sending() {
    let err = client("http://127.0.0.1:9", "").list_clubs().await.unwrap_err();
    assert!(err.to_string().contains("no user id"));
  }
}
