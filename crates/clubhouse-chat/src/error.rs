//! Error type for `clubhouse-chat`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
  /// The backend failed to resolve or begin watching a channel.
  #[error("channel unavailable: {0}")]
  ChannelUnavailable(String),

  /// The token exchange or the backend connection failed.
  #[error("chat identity unavailable: {0}")]
  IdentityUnavailable(String),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
