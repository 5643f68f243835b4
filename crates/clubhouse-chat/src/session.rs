//! The chat session coordinator.
//!
//! A [`ChatSession`] moves through `Closed → Opening → Watching → Closed`.
//! Its identity is the pair (connection generation, [`ChannelSelector`]):
//! asking again for the identity already being watched is a no-op, and
//! asking for anything else first releases the watched channel.
//!
//! Every watch that succeeds is matched by exactly one `stop_watching`, and
//! no two watches of one session are ever live together:
//!
//! - every resolve, watch, and release runs on a spawned task holding the
//!   session's operation lock, so a re-target's new watch waits until the
//!   previous channel, including one still being opened, has been released;
//! - results that arrive after the session has moved on are released by the
//!   task that produced them, so dropping the `open` future strands nothing;
//! - the session follows the identity's connection feed on its own, closing
//!   when the client goes away and reopening under a new one. The identity
//!   waits for those releases before it disconnects the old client.

use std::sync::Arc;

use tokio::{
  sync::{Mutex, watch},
  task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
  ChatError, Result,
  backend::{ChannelHandle, ChannelSelector, ChatClient},
  identity::{Connection, Lease},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Closed,
  Opening,
  Watching,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKey {
  generation: u64,
  selector:   ChannelSelector,
}

/// A live watch and the connection lease that keeps its client up.
struct Held<Ch> {
  channel: Ch,
  _lease:  Lease,
}

enum Phase<Ch> {
  Closed,
  Opening { key: SessionKey },
  Watching { key: SessionKey, held: Held<Ch> },
}

struct Inner<Ch> {
  phase:     Phase<Ch>,
  /// Bumped whenever the session is re-targeted or closed; an in-flight
  /// open only lands if the epoch it started under is still current.
  epoch:     u64,
  requested: Option<ChannelSelector>,
}

impl<Ch> Inner<Ch> {
  /// Invalidate anything in flight, go `Closed`, and hand back the watch
  /// that must now be released.
  fn retire(&mut self) -> Option<Held<Ch>> {
    self.epoch += 1;
    match std::mem::replace(&mut self.phase, Phase::Closed) {
      Phase::Watching { held, .. } => Some(held),
      Phase::Opening { .. } | Phase::Closed => None,
    }
  }
}

enum Target {
  Open(ChannelSelector),
  Close,
  /// Whatever was last requested, against the current connection.
  Requested,
}

enum Step<Ch> {
  Idle,
  Watching(Ch),
  /// An open for this key is already running under this epoch.
  InFlight(u64, SessionKey),
  Task(JoinHandle<Result<Option<Ch>>>),
}

struct Shared<C: ChatClient> {
  inner:      Mutex<Inner<C::Channel>>,
  /// Held by whichever task is resolving, watching, or releasing.
  ops:        Mutex<()>,
  /// Highest epoch whose open task has finished.
  settled:    watch::Sender<u64>,
  connection: watch::Receiver<Option<Connection<C>>>,
}

pub struct ChatSession<C: ChatClient> {
  shared:  Arc<Shared<C>>,
  monitor: JoinHandle<()>,
}

impl<C: ChatClient> ChatSession<C> {
  /// A closed session that opens channels through whichever client
  /// `connection` currently publishes.
  ///
  /// Must be called within a tokio runtime: the session spawns a task that
  /// follows `connection`.
  pub fn new(connection: watch::Receiver<Option<Connection<C>>>) -> Self {
    let (settled, _) = watch::channel(0);
    let shared = Arc::new(Shared {
      inner: Mutex::new(Inner {
        phase:     Phase::Closed,
        epoch:     0,
        requested: None,
      }),
      ops: Mutex::new(()),
      settled,
      connection: connection.clone(),
    });
    let monitor = tokio::spawn(follow_connection(Arc::clone(&shared), connection));
    Self { shared, monitor }
  }

  pub async fn state(&self) -> SessionState {
    match self.shared.inner.lock().await.phase {
      Phase::Closed => SessionState::Closed,
      Phase::Opening { .. } => SessionState::Opening,
      Phase::Watching { .. } => SessionState::Watching,
    }
  }

  /// The watched channel, only while `Watching`.
  pub async fn channel(&self) -> Option<C::Channel> {
    match &self.shared.inner.lock().await.phase {
      Phase::Watching { held, .. } => Some(held.channel.clone()),
      _ => None,
    }
  }

  /// Open (or keep) a session on `selector`.
  ///
  /// Returns the watched channel, or `None` when there is no connected
  /// client or when the session was closed or re-targeted before this open
  /// completed. An identical request while the same open is in flight waits
  /// for it and returns its channel; such a caller sees `None` rather than
  /// the error if that open fails. Failures leave the session `Closed` and
  /// are not retried.
  pub async fn open(&self, selector: ChannelSelector) -> Result<Option<C::Channel>> {
    let step = self.shared.start(Target::Open(selector)).await;
    self.shared.finish(step).await
  }

  /// Re-apply the last requested selector against the current connection.
  ///
  /// Connection changes are followed automatically; this is for callers
  /// that want the outcome of that re-apply.
  pub async fn refresh(&self) -> Result<Option<C::Channel>> {
    let step = self.shared.start(Target::Requested).await;
    self.shared.finish(step).await
  }

  /// Stop watching and forget the requested selector.
  pub async fn close(&self) {
    let step = self.shared.start(Target::Close).await;
    if let Err(e) = self.shared.finish(step).await {
      warn!(error = %e, "closing chat session failed");
    }
  }
}

impl<C: ChatClient> Drop for ChatSession<C> {
  fn drop(&mut self) {
    self.monitor.abort();
    let shared = Arc::clone(&self.shared);
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move {
          if let Step::Task(task) = shared.start(Target::Close).await {
            let _ = task.await;
          }
        });
      }
      Err(_) => warn!("chat session dropped outside a runtime; watch not released"),
    }
  }
}

impl<C: ChatClient> Shared<C> {
  /// Record `target` and decide what has to happen. Any work is spawned
  /// before this returns, so it runs even if the caller goes away.
  async fn start(self: &Arc<Self>, target: Target) -> Step<C::Channel> {
    let connection = self.connection.borrow().clone();
    let mut inner = self.inner.lock().await;

    match target {
      Target::Open(selector) => inner.requested = Some(selector),
      Target::Close => inner.requested = None,
      Target::Requested => {}
    }

    let key = match (&inner.requested, &connection) {
      (Some(selector), Some(connection)) => Some(SessionKey {
        generation: connection.generation,
        selector:   selector.clone(),
      }),
      _ => None,
    };

    match (&inner.phase, &key) {
      (Phase::Watching { key: current, held }, Some(key)) if current == key => {
        return Step::Watching(held.channel.clone());
      }
      (Phase::Opening { key: current }, Some(key)) if current == key => {
        debug!(cid = %key.selector.cid(), "open already in flight");
        return Step::InFlight(inner.epoch, key.clone());
      }
      (Phase::Closed, None) => return Step::Idle,
      _ => {}
    }

    let previous = inner.retire();
    let epoch = inner.epoch;

    match (key, connection) {
      (Some(key), Some(connection)) => {
        inner.phase = Phase::Opening { key: key.clone() };
        Step::Task(tokio::spawn(establish(
          Arc::clone(self),
          previous,
          connection,
          key,
          epoch,
        )))
      }
      _ => {
        debug!("no chat client or no request; session closed");
        match previous {
          Some(held) => Step::Task(tokio::spawn(release_only(Arc::clone(self), held))),
          None => Step::Idle,
        }
      }
    }
  }

  async fn finish(&self, step: Step<C::Channel>) -> Result<Option<C::Channel>> {
    match step {
      Step::Idle => Ok(None),
      Step::Watching(channel) => Ok(Some(channel)),
      Step::InFlight(epoch, key) => Ok(self.join_in_flight(epoch, &key).await),
      Step::Task(task) => task
        .await
        .map_err(|e| ChatError::ChannelUnavailable(e.to_string()))?,
    }
  }

  /// Wait for the open running under `epoch`, then report the channel if
  /// the session is watching `key`.
  async fn join_in_flight(&self, epoch: u64, key: &SessionKey) -> Option<C::Channel> {
    let mut settled = self.settled.subscribe();
    if settled.wait_for(|done| *done >= epoch).await.is_err() {
      return None;
    }
    match &self.inner.lock().await.phase {
      Phase::Watching { key: current, held } if current == key => Some(held.channel.clone()),
      _ => None,
    }
  }

  fn mark_settled(&self, epoch: u64) {
    self.settled.send_modify(|done| *done = (*done).max(epoch));
  }

  async fn fail(&self, epoch: u64) {
    let mut inner = self.inner.lock().await;
    if inner.epoch == epoch {
      inner.phase = Phase::Closed;
    }
  }

  async fn is_current(&self, epoch: u64) -> bool { self.inner.lock().await.epoch == epoch }
}

/// Release `previous`, then resolve and watch the channel for `key` and
/// install it if the session still wants it. Otherwise the fresh watch is
/// released here.
async fn establish<C: ChatClient>(
  shared: Arc<Shared<C>>,
  previous: Option<Held<C::Channel>>,
  connection: Connection<C>,
  key: SessionKey,
  epoch: u64,
) -> Result<Option<C::Channel>> {
  let _ops = shared.ops.lock().await;
  if let Some(held) = previous {
    release(held).await;
  }

  let result = watch_channel(&shared, &connection, key, epoch).await;
  shared.mark_settled(epoch);
  result
}

async fn watch_channel<C: ChatClient>(
  shared: &Shared<C>,
  connection: &Connection<C>,
  key: SessionKey,
  epoch: u64,
) -> Result<Option<C::Channel>> {
  let cid = key.selector.cid();

  if !shared.is_current(epoch).await {
    debug!(%cid, "session moved on before resolve; skipping");
    return Ok(None);
  }

  let channel = match connection.client.channel(&key.selector).await {
    Ok(channel) => channel,
    Err(e) => {
      shared.fail(epoch).await;
      return Err(ChatError::ChannelUnavailable(format!("{cid}: {e}")));
    }
  };

  if !shared.is_current(epoch).await {
    debug!(%cid, "session moved on before watch; skipping");
    return Ok(None);
  }

  let lease = connection.lease();
  if let Err(e) = channel.watch().await {
    shared.fail(epoch).await;
    return Err(ChatError::ChannelUnavailable(format!("{cid}: {e}")));
  }
  let held = Held { channel: channel.clone(), _lease: lease };

  let mut inner = shared.inner.lock().await;
  if inner.epoch == epoch {
    debug!(%cid, "watching channel");
    inner.phase = Phase::Watching { key, held };
    return Ok(Some(channel));
  }
  drop(inner);

  debug!(%cid, "stale watch result; releasing");
  release(held).await;
  Ok(None)
}

async fn release_only<C: ChatClient>(
  shared: Arc<Shared<C>>,
  held: Held<C::Channel>,
) -> Result<Option<C::Channel>> {
  let _ops = shared.ops.lock().await;
  release(held).await;
  Ok(None)
}

/// Stop watching, then let go of the connection lease.
async fn release<Ch: ChannelHandle>(held: Held<Ch>) {
  let channel = &held.channel;
  if let Err(e) = channel.stop_watching().await {
    warn!(cid = %channel.cid(), error = %e, "stop watching failed");
  } else {
    debug!(cid = %channel.cid(), "stopped watching channel");
  }
}

/// Re-apply the requested selector whenever the identity publishes a
/// different connection.
async fn follow_connection<C: ChatClient>(
  shared: Arc<Shared<C>>,
  mut connection: watch::Receiver<Option<Connection<C>>>,
) {
  while connection.changed().await.is_ok() {
    let step = shared.start(Target::Requested).await;
    if let Err(e) = shared.finish(step).await {
      warn!(error = %e, "reopening chat session after reconnect failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::{
    ChatIdentity,
    backend::{ChannelType, ChatUser},
    fake::{Event, Fake, FakeClient},
  };

  async fn connected(fake: &Fake, user: &str) -> ChatIdentity<Fake, Fake> {
    let id = ChatIdentity::new(fake.clone(), fake.clone());
    id.init(ChatUser::new(user)).await.unwrap();
    id
  }

  fn dm(a: &str, b: &str) -> ChannelSelector {
    ChannelSelector::members(ChannelType::Messaging, [a, b])
  }

  fn team(id: &str) -> ChannelSelector { ChannelSelector::by_id(ChannelType::Team, id) }

  fn position(events: &[Event], wanted: Event) -> usize {
    events
      .iter()
      .position(|e| *e == wanted)
      .unwrap_or_else(|| panic!("{wanted:?} missing from {events:?}"))
  }

  #[tokio::test]
  async fn open_without_client_stays_closed() {
    let fake = Fake::default();
    let id = ChatIdentity::new(fake.clone(), fake.clone());
    let session: ChatSession<FakeClient> = ChatSession::new(id.subscribe());

    assert!(session.open(team("c1")).await.unwrap().is_none());
    assert_eq!(session.state().await, SessionState::Closed);
    assert!(session.channel().await.is_none());
    assert!(fake.events().is_empty());
  }

  #[tokio::test]
  async fn open_resolves_then_watches() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());

    let channel = session.open(team("c1")).await.unwrap().unwrap();
    assert_eq!(channel.cid(), "team:c1");
    assert_eq!(session.state().await, SessionState::Watching);
    assert_eq!(fake.watches(), 1);
    assert!(fake.events().ends_with(&[
      Event::Resolve("team:c1".into()),
      Event::Watch("team:c1".into()),
    ]));
  }

  #[tokio::test]
  async fn identical_request_while_watching_is_noop() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());

    session.open(dm("u1", "u2")).await.unwrap();
    let again = session.open(dm("u2", "u1")).await.unwrap();
    assert!(again.is_some());
    assert_eq!(fake.watches(), 1);
    assert_eq!(fake.count(|e| matches!(e, Event::Resolve(_))), 1);
    assert_eq!(fake.stops(), 0);
  }

  #[tokio::test]
  async fn identical_request_while_opening_joins_in_flight_open() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = Arc::new(ChatSession::new(id.subscribe()));
    fake.knobs().held.insert("team:c1".into());

    let first = {
      let session = Arc::clone(&session);
      tokio::spawn(async move { session.open(team("c1")).await })
    };
    fake.settle(|f| f.count(|e| matches!(e, Event::Resolve(_))) == 1).await;

    let second = {
      let session = Arc::clone(&session);
      tokio::spawn(async move { session.open(team("c1")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    fake.release_watches();

    let a = first.await.unwrap().unwrap().unwrap();
    let b = second.await.unwrap().unwrap().unwrap();
    assert_eq!(a.cid(), b.cid());
    assert_eq!(fake.count(|e| matches!(e, Event::Resolve(_))), 1);
    assert_eq!(fake.watches(), 1);
  }

  #[tokio::test]
  async fn retarget_stops_old_before_watching_new() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());

    session.open(team("c1")).await.unwrap();
    session.open(team("c2")).await.unwrap();

    let events = fake.events();
    let stop_c1 = position(&events, Event::StopWatching("team:c1".into()));
    let watch_c2 = position(&events, Event::Watch("team:c2".into()));
    assert!(stop_c1 < watch_c2);
    assert_eq!(fake.count(|e| *e == Event::StopWatching("team:c1".into())), 1);
    assert_eq!(session.channel().await.unwrap().cid(), "team:c2");
  }

  #[tokio::test]
  async fn retarget_while_opening_waits_for_old_watch_to_be_released() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = Arc::new(ChatSession::new(id.subscribe()));
    fake.knobs().held.insert("team:c1".into());

    let first = {
      let session = Arc::clone(&session);
      tokio::spawn(async move { session.open(team("c1")).await })
    };
    fake.settle(|f| f.count(|e| matches!(e, Event::Resolve(_))) == 1).await;

    let second = {
      let session = Arc::clone(&session);
      tokio::spawn(async move { session.open(team("c2")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fake.watches(), 0);
    fake.release_watches();

    first.await.unwrap().unwrap();
    let channel = second.await.unwrap().unwrap().unwrap();
    assert_eq!(channel.cid(), "team:c2");

    let events = fake.events();
    let stop_c1 = position(&events, Event::StopWatching("team:c1".into()));
    let watch_c2 = position(&events, Event::Watch("team:c2".into()));
    assert!(stop_c1 < watch_c2, "{events:?}");
    assert_eq!(fake.count(|e| *e == Event::Watch("team:c1".into())), 1);
    assert_eq!(fake.count(|e| *e == Event::StopWatching("team:c1".into())), 1);
    assert_eq!(session.state().await, SessionState::Watching);
  }

  #[tokio::test]
  async fn close_releases_exactly_once() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());

    session.open(team("c1")).await.unwrap();
    session.close().await;
    session.close().await;
    assert_eq!(session.state().await, SessionState::Closed);
    assert_eq!(fake.stops(), 1);

    // Closing forgets the request.
    assert!(session.refresh().await.unwrap().is_none());
    assert_eq!(fake.watches(), 1);
  }

  #[tokio::test]
  async fn drop_releases_watch() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());

    session.open(team("c1")).await.unwrap();
    drop(session);

    fake.settle(|f| f.stops() == 1).await;
    assert_eq!(fake.watches(), 1);
  }

  #[tokio::test]
  async fn resolve_failure_is_channel_unavailable() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());
    fake.knobs().fail_resolve = true;

    let err = session.open(team("c1")).await.unwrap_err();
    assert!(matches!(err, ChatError::ChannelUnavailable(_)));
    assert_eq!(session.state().await, SessionState::Closed);
    assert_eq!(fake.count(|e| matches!(e, Event::Resolve(_))), 1);
  }

  #[tokio::test]
  async fn watch_failure_is_channel_unavailable_and_not_released() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());
    fake.knobs().fail_watch = true;

    let err = session.open(team("c1")).await.unwrap_err();
    assert!(matches!(err, ChatError::ChannelUnavailable(_)));
    assert_eq!(session.state().await, SessionState::Closed);
    assert_eq!(fake.stops(), 0);
  }

  #[tokio::test]
  async fn close_during_opening_releases_late_watch() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = Arc::new(ChatSession::new(id.subscribe()));
    fake.knobs().held.insert("team:c1".into());

    let opener = {
      let session = Arc::clone(&session);
      tokio::spawn(async move { session.open(team("c1")).await })
    };
    fake.settle(|f| f.count(|e| matches!(e, Event::Resolve(_))) == 1).await;
    assert_eq!(session.state().await, SessionState::Opening);

    session.close().await;
    fake.release_watches();

    assert!(opener.await.unwrap().unwrap().is_none());
    assert_eq!(fake.watches(), 1);
    assert_eq!(fake.stops(), 1);
    assert_eq!(session.state().await, SessionState::Closed);
  }

  #[tokio::test]
  async fn dropped_open_future_still_balances() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());
    fake.knobs().held.insert("team:c1".into());

    // Abandon the open mid-flight, then unmount.
    let open = session.open(team("c1"));
    let _ = tokio::time::timeout(Duration::from_millis(20), open).await;
    drop(session);
    fake.release_watches();

    fake.settle(|f| f.watches() == 1 && f.stops() == 1).await;
  }

  #[tokio::test]
  async fn teardown_closes_session_before_disconnecting() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());
    session.open(team("c1")).await.unwrap();

    id.teardown().await;

    assert_eq!(session.state().await, SessionState::Closed);
    assert!(session.channel().await.is_none());
    let events = fake.events();
    let stop = position(&events, Event::StopWatching("team:c1".into()));
    let disconnect = position(&events, Event::Disconnect("u1".into()));
    assert!(stop < disconnect, "{events:?}");
    assert_eq!(fake.stops(), 1);
  }

  #[tokio::test]
  async fn reconnect_reopens_without_refresh() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());
    session.open(team("c1")).await.unwrap();

    id.init(ChatUser::new("u2")).await.unwrap();
    fake.settle(|f| f.watches() == 2).await;

    let events = fake.events();
    let stop = position(&events, Event::StopWatching("team:c1".into()));
    let disconnect = position(&events, Event::Disconnect("u1".into()));
    let connect = position(&events, Event::Connect("u2".into()));
    assert!(stop < disconnect && disconnect < connect, "{events:?}");
    assert_eq!(fake.stops(), 1);

    // Refreshing under the same connection joins or keeps the reopened watch.
    assert!(session.refresh().await.unwrap().is_some());
    assert_eq!(session.state().await, SessionState::Watching);
    assert_eq!(fake.watches(), 2);
  }

  #[tokio::test]
  async fn logout_then_login_reopens_requested_channel() {
    let fake = Fake::default();
    let id = connected(&fake, "u1").await;
    let session = ChatSession::new(id.subscribe());
    session.open(team("c1")).await.unwrap();

    id.set_user(None).await.unwrap();
    assert_eq!(session.state().await, SessionState::Closed);

    id.init(ChatUser::new("u1")).await.unwrap();
    fake.settle(|f| f.watches() == 2).await;
    let channel = session.refresh().await.unwrap().unwrap();
    assert_eq!(channel.cid(), "team:c1");
    assert_eq!(fake.stops(), 1);
  }
}
