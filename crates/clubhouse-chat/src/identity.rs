//! The chat identity: one connected backend client per logged-in user.
//!
//! [`ChatIdentity`] is an ordinary owned value. Construct one per application
//! session and hand its [`ChatIdentity::subscribe`] receiver to whatever
//! needs the client. Calls that change the user are serialised, and the old
//! connection is always torn down before a new one is attempted, so at most
//! one connection is ever live. Sessions watching channels through the old
//! client are given [`DRAIN_TIMEOUT`] to stop watching before it goes.

use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::{
  ChatError, Result,
  backend::{ChatClient, ChatUser, MessagingBackend},
  token::TokenSource,
};

/// How long a disconnect waits for live watches to be released.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A live backend connection as published to dependents.
///
/// `generation` increases on every successful connect, so a reconnect under
/// the same user still reads as a change.
pub struct Connection<C> {
  pub user:       ChatUser,
  pub generation: u64,
  pub client:     Arc<C>,
  leases:         Leases,
}

impl<C> Clone for Connection<C> {
  fn clone(&self) -> Self {
    Self {
      user:       self.user.clone(),
      generation: self.generation,
      client:     Arc::clone(&self.client),
      leases:     self.leases.clone(),
    }
  }
}

impl<C> fmt::Debug for Connection<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Connection")
      .field("user", &self.user)
      .field("generation", &self.generation)
      .finish_non_exhaustive()
  }
}

impl<C> Connection<C> {
  pub fn user_id(&self) -> &str { &self.user.id }

  /// Keep this client connected until the returned lease is dropped, or
  /// until [`DRAIN_TIMEOUT`] after the identity starts tearing it down.
  pub(crate) fn lease(&self) -> Lease { self.leases.acquire() }
}

// ─── Leases ──────────────────────────────────────────────────────────────────

/// Count of live watches on one connection.
#[derive(Clone)]
struct Leases(Arc<watch::Sender<usize>>);

impl Leases {
  fn new() -> Self { Self(Arc::new(watch::channel(0).0)) }

  fn acquire(&self) -> Lease {
    self.0.send_modify(|n| *n += 1);
    Lease(Arc::clone(&self.0))
  }

  fn live(&self) -> usize { *self.0.borrow() }

  async fn drained(&self) {
    let mut rx = self.0.subscribe();
    let _ = rx.wait_for(|n| *n == 0).await;
  }
}

pub(crate) struct Lease(Arc<watch::Sender<usize>>);

impl Drop for Lease {
  fn drop(&mut self) { self.0.send_modify(|n| *n = n.saturating_sub(1)); }
}

struct State<C> {
  current:    Option<Connection<C>>,
  generation: u64,
}

pub struct ChatIdentity<B: MessagingBackend, T> {
  backend: B,
  tokens:  T,
  state:   Mutex<State<B::Client>>,
  tx:      watch::Sender<Option<Connection<B::Client>>>,
}

impl<B, T> ChatIdentity<B, T>
where
  B: MessagingBackend,
  T: TokenSource,
{
  pub fn new(backend: B, tokens: T) -> Self {
    let (tx, _rx) = watch::channel(None);
    Self {
      backend,
      tokens,
      state: Mutex::new(State { current: None, generation: 0 }),
      tx,
    }
  }

  /// Receiver of the current connection; `None` while disconnected.
  pub fn subscribe(&self) -> watch::Receiver<Option<Connection<B::Client>>> {
    self.tx.subscribe()
  }

  pub fn current(&self) -> Option<Connection<B::Client>> { self.tx.borrow().clone() }

  pub fn is_ready(&self) -> bool { self.tx.borrow().is_some() }

  /// Follow the logged-in user: connect for `Some`, tear down for `None` or
  /// an empty id.
  pub async fn set_user(
    &self,
    user: Option<ChatUser>,
  ) -> Result<Option<Connection<B::Client>>> {
    match user {
      Some(user) => self.init(user).await,
      None => {
        self.teardown().await;
        Ok(None)
      }
    }
  }

  /// Connect as `user`, replacing any connection for a different user.
  ///
  /// Connecting as the user who is already connected returns the existing
  /// connection untouched. An empty id only tears down. On failure the
  /// provider is left disconnected.
  pub async fn init(&self, user: ChatUser) -> Result<Option<Connection<B::Client>>> {
    let mut state = self.state.lock().await;

    if let Some(current) = &state.current
      && current.user.id == user.id
    {
      return Ok(Some(current.clone()));
    }

    self.disconnect_current(&mut state).await;

    if user.id.is_empty() {
      debug!("empty user id; chat identity stays disconnected");
      return Ok(None);
    }

    let token = self
      .tokens
      .fetch_token(&user.id)
      .await
      .map_err(|e| ChatError::IdentityUnavailable(e.to_string()))?;

    let client = self
      .backend
      .connect(&user, &token)
      .await
      .map_err(|e| ChatError::IdentityUnavailable(e.to_string()))?;

    state.generation += 1;
    let connection = Connection {
      user,
      generation: state.generation,
      client: Arc::new(client),
      leases: Leases::new(),
    };
    info!(user_id = %connection.user.id, generation = connection.generation, "chat client connected");

    state.current = Some(connection.clone());
    self.tx.send_replace(Some(connection.clone()));
    Ok(Some(connection))
  }

  /// Disconnect the current client, if any.
  pub async fn teardown(&self) {
    let mut state = self.state.lock().await;
    self.disconnect_current(&mut state).await;
  }

  async fn disconnect_current(&self, state: &mut State<B::Client>) {
    let Some(old) = state.current.take() else { return };

    // Unpublish first so no dependent picks up a client mid-disconnect.
    self.tx.send_replace(None);
    if tokio::time::timeout(DRAIN_TIMEOUT, old.leases.drained()).await.is_err() {
      warn!(
        user_id = %old.user.id,
        live = old.leases.live(),
        "watches still live at disconnect"
      );
    }
    if let Err(e) = old.client.disconnect().await {
      warn!(user_id = %old.user.id, error = %e, "chat client disconnect failed");
    }
    info!(user_id = %old.user.id, generation = old.generation, "chat client disconnected");
  }
}
