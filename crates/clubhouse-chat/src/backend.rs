//! The messaging-backend contract.
//!
//! The backend itself (channels, presence, threads, message rendering) lives
//! outside this workspace. These traits are the only surface the coordinator
//! relies on.

use std::{collections::BTreeSet, fmt, future::Future};

use clubhouse_core::club::Club;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ─── Identity ────────────────────────────────────────────────────────────────

/// The user a backend connection is opened for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
  pub id:   String,
  pub name: Option<String>,
}

impl ChatUser {
  pub fn new(id: impl Into<String>) -> Self { Self { id: id.into(), name: None } }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }
}

/// Opaque bearer credential for the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(pub String);

impl SessionToken {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for SessionToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SessionToken(..)")
  }
}

// ─── Channel selection ───────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
  /// One-on-one and small group conversations.
  Messaging,
  /// Broadcast-style channels, one per club.
  Team,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTarget {
  Id(String),
  /// Member set from which the backend derives (or creates) the channel.
  /// Ordered, so the same people always name the same channel.
  Members(BTreeSet<String>),
}

/// Everything that determines which channel a session watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSelector {
  pub channel_type: ChannelType,
  pub target:       ChannelTarget,
}

impl ChannelSelector {
  pub fn by_id(channel_type: ChannelType, id: impl Into<String>) -> Self {
    Self { channel_type, target: ChannelTarget::Id(id.into()) }
  }

  pub fn members<I, S>(channel_type: ChannelType, members: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      channel_type,
      target: ChannelTarget::Members(members.into_iter().map(Into::into).collect()),
    }
  }

  /// The team channel of `club`.
  ///
  /// Only members should be let into it; that check is the caller's, see
  /// [`ChannelSelector::for_member`].
  pub fn for_club(club: &Club) -> Self {
    Self::by_id(ChannelType::Team, club.club_id.to_string())
  }

  /// The team channel of `club`, or `None` if `user_id` is not a member.
  pub fn for_member(club: &Club, user_id: &str) -> Option<Self> {
    club.is_member(user_id).then(|| Self::for_club(club))
  }

  /// Stable channel identifier, `type:id` or `type:!members-a,b,c`.
  pub fn cid(&self) -> String {
    match &self.target {
      ChannelTarget::Id(id) => format!("{}:{id}", self.channel_type),
      ChannelTarget::Members(members) => {
        let joined = members.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        format!("{}:!members-{joined}", self.channel_type)
      }
    }
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// A resolved channel. Cloning shares the same underlying channel.
pub trait ChannelHandle: Clone + Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn cid(&self) -> String;

  /// Start receiving real-time events for this channel.
  fn watch(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Release a watch started by [`ChannelHandle::watch`].
  fn stop_watching(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// A client connected under one user identity.
pub trait ChatClient: Send + Sync + 'static {
  type Channel: ChannelHandle;
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch the channel named by `selector`, creating it if needed.
  fn channel<'a>(
    &'a self,
    selector: &'a ChannelSelector,
  ) -> impl Future<Output = Result<Self::Channel, Self::Error>> + Send + 'a;

  fn disconnect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

pub trait MessagingBackend: Send + Sync {
  type Client: ChatClient;
  type Error: std::error::Error + Send + Sync + 'static;

  fn connect<'a>(
    &'a self,
    user: &'a ChatUser,
    token: &'a SessionToken,
  ) -> impl Future<Output = Result<Self::Client, Self::Error>> + Send + 'a;
}
