//! Error types for `clubhouse-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// The store could not be reached or failed while serving the call.
  #[error("store unavailable: {0}")]
  StoreUnavailable(String),

  /// The store was reachable but refused the write.
  #[error("store rejected the operation: {0}")]
  StoreRejected(String),

  #[error("club not found: {0}")]
  ClubNotFound(Uuid),

  #[error("{actor} is not allowed to {action} club {club_id}")]
  NotAuthorized {
    actor:   String,
    action:  &'static str,
    club_id: Uuid,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Classify a backend failure into the store half of the taxonomy.
  pub fn from_store<E: StoreError>(err: E) -> Self {
    if err.is_rejection() {
      Self::StoreRejected(err.to_string())
    } else {
      Self::StoreUnavailable(err.to_string())
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
