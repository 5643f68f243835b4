//! [`MemoryStore`]: an in-process [`ClubStore`].
//!
//! Backs tests and embedded use. Each write takes the collection lock, applies
//! the patch, and publishes the resulting snapshot before releasing it, so
//! subscribers observe snapshots in write order.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  club::{Club, ClubPatch, NewClub, PatchError},
  store::{ClubStore, ClubSubscription, SnapshotFeed, StoreError},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("club not found: {0}")]
  NotFound(Uuid),

  #[error(transparent)]
  Patch(#[from] PatchError),
}

impl StoreError for MemoryError {
  fn is_rejection(&self) -> bool { true }
}

/// Cloning is cheap; clones share the same collection and feed.
#[derive(Clone)]
pub struct MemoryStore {
  clubs: Arc<Mutex<Vec<Club>>>,
  feed:  SnapshotFeed,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      clubs: Arc::new(Mutex::new(Vec::new())),
      feed:  SnapshotFeed::new(Vec::new()),
    }
  }

  /// Seed the store with existing records, e.g. from a fixture.
  pub fn with_clubs(clubs: Vec<Club>) -> Self {
    Self {
      feed:  SnapshotFeed::new(clubs.clone()),
      clubs: Arc::new(Mutex::new(clubs)),
    }
  }

  pub fn subscriber_count(&self) -> usize { self.feed.subscriber_count() }
}

impl ClubStore for MemoryStore {
  type Error = MemoryError;

  async fn create(&self, input: NewClub) -> Result<Club, MemoryError> {
    let club = Club::from_new(Uuid::new_v4(), input, Utc::now());
    let mut clubs = self.clubs.lock().await;
    clubs.push(club.clone());
    self.feed.publish(clubs.clone());
    Ok(club)
  }

  async fn get(&self, club_id: Uuid) -> Result<Option<Club>, MemoryError> {
    let clubs = self.clubs.lock().await;
    Ok(clubs.iter().find(|c| c.club_id == club_id).cloned())
  }

  async fn list(&self) -> Result<Vec<Club>, MemoryError> {
    Ok(self.clubs.lock().await.clone())
  }

  async fn update(&self, club_id: Uuid, patch: ClubPatch) -> Result<(), MemoryError> {
    let mut clubs = self.clubs.lock().await;
    let club = clubs
      .iter_mut()
      .find(|c| c.club_id == club_id)
      .ok_or(MemoryError::NotFound(club_id))?;

    if club.apply(&patch, Utc::now())? {
      self.feed.publish(clubs.clone());
    }
    Ok(())
  }

  async fn delete(&self, club_id: Uuid) -> Result<(), MemoryError> {
    let mut clubs = self.clubs.lock().await;
    let before = clubs.len();
    clubs.retain(|c| c.club_id != club_id);
    if clubs.len() != before {
      self.feed.publish(clubs.clone());
    }
    Ok(())
  }

  async fn subscribe(&self) -> Result<ClubSubscription, MemoryError> {
    Ok(self.feed.subscribe())
  }
}
