//! Recording in-process backend used by the chat tests.

use std::{
  collections::HashSet,
  fmt,
  sync::{Arc, Mutex},
  time::Duration,
};

use thiserror::Error;
use tokio::sync::Notify;

use crate::{
  backend::{ChannelHandle, ChannelSelector, ChatClient, ChatUser, MessagingBackend, SessionToken},
  token::TokenSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  Token(String),
  Connect(String),
  Disconnect(String),
  Resolve(String),
  Watch(String),
  StopWatching(String),
}

#[derive(Debug, Error)]
#[error("fake backend failure: {0}")]
pub struct FakeError(pub &'static str);

#[derive(Default)]
pub struct Knobs {
  pub fail_token:   bool,
  pub fail_connect: bool,
  pub fail_resolve: bool,
  pub fail_watch:   bool,
  /// Watches on these cids block until [`Fake::release_watches`].
  pub held:         HashSet<String>,
}

/// Shared log and failure switches for every fake component.
#[derive(Clone, Default)]
pub struct Fake {
  log:   Arc<Mutex<Vec<Event>>>,
  knobs: Arc<Mutex<Knobs>>,
  gate:  Arc<Notify>,
}

impl Fake {
  pub fn events(&self) -> Vec<Event> { self.log.lock().unwrap().clone() }

  pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
    self.log.lock().unwrap().iter().filter(|e| pred(e)).count()
  }

  pub fn watches(&self) -> usize { self.count(|e| matches!(e, Event::Watch(_))) }

  pub fn stops(&self) -> usize { self.count(|e| matches!(e, Event::StopWatching(_))) }

  pub fn knobs(&self) -> std::sync::MutexGuard<'_, Knobs> { self.knobs.lock().unwrap() }

  pub fn release_watches(&self) {
    self.knobs().held.clear();
    self.gate.notify_waiters();
  }

  fn record(&self, e: Event) { self.log.lock().unwrap().push(e); }

  /// Yield until `cond` holds, for effects that happen on spawned tasks.
  pub async fn settle(&self, cond: impl Fn(&Fake) -> bool) {
    for _ in 0..100 {
      if cond(self) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition never held; events: {:?}", self.events());
  }
}

impl TokenSource for Fake {
  type Error = FakeError;

  async fn fetch_token(&self, user_id: &str) -> Result<SessionToken, FakeError> {
    self.record(Event::Token(user_id.to_owned()));
    if self.knobs().fail_token {
      return Err(FakeError("token"));
    }
    Ok(SessionToken(format!("tok-{user_id}")))
  }
}

impl MessagingBackend for Fake {
  type Client = FakeClient;
  type Error = FakeError;

  async fn connect(&self, user: &ChatUser, token: &SessionToken) -> Result<FakeClient, FakeError> {
    assert_eq!(token.as_str(), format!("tok-{}", user.id));
    if self.knobs().fail_connect {
      return Err(FakeError("connect"));
    }
    self.record(Event::Connect(user.id.clone()));
    Ok(FakeClient { fake: self.clone(), user: user.id.clone() })
  }
}

pub struct FakeClient {
  fake: Fake,
  user: String,
}

impl fmt::Debug for FakeClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FakeClient").field("user", &self.user).finish_non_exhaustive()
  }
}

impl ChatClient for FakeClient {
  type Channel = FakeChannel;
  type Error = FakeError;

  async fn channel(&self, selector: &ChannelSelector) -> Result<FakeChannel, FakeError> {
    let cid = selector.cid();
    self.fake.record(Event::Resolve(cid.clone()));
    if self.fake.knobs().fail_resolve {
      return Err(FakeError("resolve"));
    }
    Ok(FakeChannel { fake: self.fake.clone(), cid })
  }

  async fn disconnect(&self) -> Result<(), FakeError> {
    self.fake.record(Event::Disconnect(self.user.clone()));
    Ok(())
  }
}

#[derive(Clone)]
pub struct FakeChannel {
  fake: Fake,
  cid:  String,
}

impl fmt::Debug for FakeChannel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FakeChannel").field("cid", &self.cid).finish_non_exhaustive()
  }
}

impl ChannelHandle for FakeChannel {
  type Error = FakeError;

  fn cid(&self) -> String { self.cid.clone() }

  async fn watch(&self) -> Result<(), FakeError> {
    loop {
      let notified = self.fake.gate.notified();
      if !self.fake.knobs().held.contains(&self.cid) {
        break;
      }
      notified.await;
    }
    if self.fake.knobs().fail_watch {
      return Err(FakeError("watch"));
    }
    self.fake.record(Event::Watch(self.cid.clone()));
    Ok(())
  }

  async fn stop_watching(&self) -> Result<(), FakeError> {
    self.fake.record(Event::StopWatching(self.cid.clone()));
    Ok(())
  }
}
