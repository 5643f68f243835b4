//! Error type for `clubhouse-store-sqlite`.

use clubhouse_core::{club::PatchError, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("club not found: {0}")]
  ClubNotFound(uuid::Uuid),

  #[error(transparent)]
  Patch(#[from] PatchError),
}

impl StoreError for Error {
  fn is_rejection(&self) -> bool {
    matches!(self, Error::ClubNotFound(_) | Error::Patch(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
