//! Client-side projection of the club collection.
//!
//! A [`ClubRegistry`] owns one live subscription and the latest full snapshot
//! it delivered. It has no mutation path of its own: writes go through
//! [`crate::membership::MembershipService`] and only become visible here once
//! the store publishes them, which may lag behind the write returning.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  club::Club,
  selector::{ClubFilter, Partition, partition},
  store::{ClubStore, ClubSubscription, Snapshot},
};

pub struct ClubRegistry {
  subscription: ClubSubscription,
  snapshot:     Arc<Snapshot>,
}

impl ClubRegistry {
  /// Subscribe to `store` and take its current full snapshot.
  pub async fn mount<S: ClubStore>(store: &S) -> Result<Self> {
    let mut subscription = store.subscribe().await.map_err(Error::from_store)?;
    let snapshot = subscription.current();
    debug!(version = snapshot.version, clubs = snapshot.clubs.len(), "registry mounted");
    Ok(Self { subscription, snapshot })
  }

  /// Wait for the next notification and replace the held snapshot with it.
  ///
  /// Returns `false` once the store has shut down; the last snapshot is kept.
  pub async fn next(&mut self) -> bool {
    match self.subscription.next().await {
      Some(snapshot) => {
        debug!(version = snapshot.version, "registry snapshot replaced");
        self.snapshot = snapshot;
        true
      }
      None => false,
    }
  }

  pub fn snapshot(&self) -> &Arc<Snapshot> { &self.snapshot }

  pub fn clubs(&self) -> &[Club] { &self.snapshot.clubs }

  pub fn get(&self, club_id: Uuid) -> Option<&Club> { self.snapshot.get(club_id) }

  pub fn partition(&self, user_id: &str, filter: &ClubFilter) -> Partition {
    partition(self.clubs(), user_id, filter)
  }

  /// Drop the subscription. Mounting again starts from a fresh snapshot.
  pub fn unmount(self) {
    debug!(version = self.snapshot.version, "registry unmounted");
    self.subscription.unsubscribe();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{club::NewClub, membership::MembershipService, memory::MemoryStore};

  fn new_club(leader: &str) -> NewClub {
    NewClub {
      name:        "Climbing".into(),
      category:    "Outdoors".into(),
      description: "Bouldering on Thursdays".into(),
      tags:        vec![],
      leader_id:   leader.into(),
      leader_name: "Lee".into(),
      private:     false,
      capacity:    None,
    }
  }

  #[tokio::test]
  async fn mount_reads_existing_records() {
    let store = Arc::new(MemoryStore::new());
    let svc = MembershipService::new(Arc::clone(&store));
    svc.create_club(new_club("u1")).await.unwrap();
    svc.create_club(new_club("u2")).await.unwrap();

    let registry = ClubRegistry::mount(store.as_ref()).await.unwrap();
    assert_eq!(registry.clubs().len(), 2);
  }

  #[tokio::test]
  async fn notifications_replace_the_whole_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let svc = MembershipService::new(Arc::clone(&store));
    let id = svc.create_club(new_club("u1")).await.unwrap().club_id;

    let mut registry = ClubRegistry::mount(store.as_ref()).await.unwrap();
    let first = Arc::clone(registry.snapshot());

    svc.join_club(id, "u2").await.unwrap();
    assert!(registry.next().await);

    assert!(registry.snapshot().version > first.version);
    assert!(!Arc::ptr_eq(registry.snapshot(), &first));
    assert_eq!(registry.get(id).unwrap().members, vec!["u1", "u2"]);
    // The old snapshot is untouched.
    assert_eq!(first.get(id).unwrap().members, vec!["u1"]);
  }

  #[tokio::test]
  async fn unmount_releases_and_remount_is_fresh() {
    let store = Arc::new(MemoryStore::new());
    let svc = MembershipService::new(Arc::clone(&store));

    let registry = ClubRegistry::mount(store.as_ref()).await.unwrap();
    assert_eq!(store.subscriber_count(), 1);
    registry.unmount();
    assert_eq!(store.subscriber_count(), 0);

    svc.create_club(new_club("u1")).await.unwrap();

    let registry = ClubRegistry::mount(store.as_ref()).await.unwrap();
    assert_eq!(registry.clubs().len(), 1);
  }

  #[tokio::test]
  async fn leader_leaving_stays_in_created_bucket() {
    let store = Arc::new(MemoryStore::new());
    let svc = MembershipService::new(Arc::clone(&store));
    let c1 = svc.create_club(new_club("u1")).await.unwrap().club_id;
    let mut registry = ClubRegistry::mount(store.as_ref()).await.unwrap();

    svc.join_club(c1, "u2").await.unwrap();
    svc.leave_club(c1, "u1").await.unwrap();
    assert!(registry.next().await);

    assert_eq!(registry.get(c1).unwrap().members, vec!["u2"]);

    let p = registry.partition("u1", &ClubFilter::default());
    assert_eq!(p.created.len(), 1);
    assert!(p.joined.is_empty());

    let p = registry.partition("u2", &ClubFilter::default());
    assert_eq!(p.joined.len(), 1);
  }
}
