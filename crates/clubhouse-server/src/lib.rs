//! HTTP server assembly for Clubhouse.
//!
//! Wires a [`ClubStore`] and a [`TokenIssuer`] into the JSON API and wraps
//! the result in request tracing. The binary in `main.rs` only loads
//! configuration and opens the store.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use chrono::Duration;
use clubhouse_api::{TokenIssuer, api_router};
use clubhouse_core::{membership::MembershipService, store::ClubStore};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CLUBHOUSE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  /// Shared with the messaging backend. Random per process when unset.
  pub token_secret:   Option<String>,
  #[serde(default = "default_token_ttl")]
  pub token_ttl_secs: u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/clubhouse/clubs.db") }

fn default_token_ttl() -> u64 { 3600 }

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// The configured token secret, or a fresh random one.
  ///
  /// A random secret invalidates every issued token on restart.
  pub fn token_secret(&self) -> String {
    match self.token_secret.as_deref().map(str::trim) {
      Some(secret) if !secret.is_empty() => secret.to_string(),
      _ => {
        warn!("no token_secret configured; using a random per-process secret");
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
      }
    }
  }

  pub fn token_issuer(&self) -> TokenIssuer {
    let ttl = i64::try_from(self.token_ttl_secs).unwrap_or(i64::MAX / 1000);
    TokenIssuer::new(&self.token_secret(), Duration::seconds(ttl))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router for `store`.
pub fn router<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: ClubStore + 'static,
{
  let service = MembershipService::new(store);
  api_router(service, Arc::new(config.token_issuer())).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use clubhouse_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  fn test_config(secret: Option<&str>) -> ServerConfig {
    ServerConfig {
      host:           default_host(),
      port:           default_port(),
      store_path:     PathBuf::from(":memory:"),
      token_secret:   secret.map(str::to_owned),
      token_ttl_secs: 60,
    }
  }

  #[test]
  fn defaults_fill_missing_fields() {
    let cfg: ServerConfig = config::Config::builder()
      .set_override("port", 9000)
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.address(), "127.0.0.1:9000");
    assert_eq!(cfg.token_ttl_secs, 3600);
    assert!(cfg.token_secret.is_none());
  }

  #[test]
  fn configured_secret_is_used_and_blank_is_replaced() {
    assert_eq!(test_config(Some("abc")).token_secret(), "abc");

    let random = test_config(Some("  ")).token_secret();
    assert_eq!(random.len(), 64);
    assert_ne!(random, test_config(None).token_secret());
  }

  #[tokio::test]
  async fn router_serves_sqlite_backed_api() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let app = router(store, &test_config(Some("abc")));

    let req = Request::builder()
      .method("POST")
      .uri("/clubs")
      .header("x-user-id", "u1")
      .header("content-type", "application/json")
      .body(Body::from(r#"{"name":"Chess","category":"Games"}"#))
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = Request::builder()
      .uri("/me/clubs")
      .header("x-user-id", "u1")
      .body(Body::empty())
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["created"].as_array().unwrap().len(), 1);
  }
}
