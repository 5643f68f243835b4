//! The `ClubStore` trait and the live-snapshot plumbing shared by backends.
//!
//! The trait is implemented by storage backends (`MemoryStore` here,
//! `clubhouse-store-sqlite` elsewhere). Higher layers depend on this
//! abstraction, not on any concrete backend.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::club::{Club, ClubPatch, NewClub};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend error contract.
///
/// A rejection means the store was reachable and refused the write (missing
/// record, capacity exceeded). Everything else counts as unavailability.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_rejection(&self) -> bool;
}

impl StoreError for std::convert::Infallible {
  fn is_rejection(&self) -> bool { match *self {} }
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

/// The full set of club records at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  /// Monotonic per store; bumped on every accepted write.
  pub version:  u64,
  pub taken_at: Option<DateTime<Utc>>,
  pub clubs:    Vec<Club>,
}

impl Snapshot {
  pub fn get(&self, club_id: Uuid) -> Option<&Club> {
    self.clubs.iter().find(|c| c.club_id == club_id)
  }
}

/// A live subscription to a store's club collection.
///
/// Dropping it cancels the subscription. A new subscription always starts
/// from the store's current full snapshot.
#[derive(Debug)]
pub struct ClubSubscription {
  rx: watch::Receiver<Arc<Snapshot>>,
}

impl ClubSubscription {
  /// The snapshot most recently delivered, marking it as seen.
  pub fn current(&mut self) -> Arc<Snapshot> {
    Arc::clone(&self.rx.borrow_and_update())
  }

  /// Wait for the next snapshot. Intermediate snapshots may be skipped; only
  /// the latest one is ever returned. `None` once the store has gone away.
  pub async fn next(&mut self) -> Option<Arc<Snapshot>> {
    self.rx.changed().await.ok()?;
    Some(self.current())
  }

  pub fn unsubscribe(self) {}
}

/// Fan-out of full snapshots to every live subscription.
///
/// Backends call [`SnapshotFeed::publish`] after each accepted write with a
/// freshly read club list.
#[derive(Debug, Clone)]
pub struct SnapshotFeed {
  tx: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl SnapshotFeed {
  pub fn new(initial: Vec<Club>) -> Self {
    let snapshot = Snapshot { version: 0, taken_at: Some(Utc::now()), clubs: initial };
    let (tx, _rx) = watch::channel(Arc::new(snapshot));
    Self { tx: Arc::new(tx) }
  }

  pub fn publish(&self, clubs: Vec<Club>) {
    let version = self.tx.borrow().version + 1;
    tracing::debug!(version, clubs = clubs.len(), "publishing club snapshot");
    self.tx.send_replace(Arc::new(Snapshot {
      version,
      taken_at: Some(Utc::now()),
      clubs,
    }));
  }

  pub fn subscribe(&self) -> ClubSubscription {
    let mut rx = self.tx.subscribe();
    rx.mark_changed();
    ClubSubscription { rx }
  }

  pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the club document store.
///
/// Writes are patch-based and applied atomically by the backend; callers never
/// read-modify-write. A successful write does not imply that any particular
/// subscription has observed it yet.
pub trait ClubStore: Send + Sync {
  type Error: StoreError;

  /// Insert a new record and return it with its store-assigned id.
  fn create(
    &self,
    input: NewClub,
  ) -> impl Future<Output = Result<Club, Self::Error>> + Send + '_;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get(
    &self,
    club_id: Uuid,
  ) -> impl Future<Output = Result<Option<Club>, Self::Error>> + Send + '_;

  /// All records, oldest first.
  fn list(&self) -> impl Future<Output = Result<Vec<Club>, Self::Error>> + Send + '_;

  /// Apply a partial patch. Fails with a rejection if the record does not
  /// exist or the patch would exceed the club's capacity.
  fn update(
    &self,
    club_id: Uuid,
    patch: ClubPatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a record. Deleting an absent record succeeds.
  fn delete(
    &self,
    club_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Open a live subscription whose first value is the current full snapshot.
  fn subscribe(
    &self,
  ) -> impl Future<Output = Result<ClubSubscription, Self::Error>> + Send + '_;
}
