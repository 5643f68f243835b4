//! Club membership operations.
//!
//! [`MembershipService`] holds no state of its own: every call is a single
//! write through to the [`ClubStore`]. Join and leave are set-union and
//! set-remove patches, so repeating them is harmless and concurrent calls
//! from other clients compose. Errors are surfaced unchanged and never
//! retried here.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  club::{Club, ClubDetails, ClubPatch, NewClub},
  store::ClubStore,
};

pub struct MembershipService<S> {
  store: Arc<S>,
}

impl<S> Clone for MembershipService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store) }
  }
}

impl<S: ClubStore> MembershipService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Create a club led by `input.leader_id`, who becomes its only member.
  /// Names are not required to be unique.
  pub async fn create_club(&self, input: NewClub) -> Result<Club> {
    let club = self.store.create(input).await.map_err(Error::from_store)?;
    info!(club_id = %club.club_id, leader = %club.leader_id, "club created");
    Ok(club)
  }

  /// Add `user_id` to the member set. A no-op if already a member.
  pub async fn join_club(&self, club_id: Uuid, user_id: &str) -> Result<()> {
    self
      .store
      .update(club_id, ClubPatch::join(user_id))
      .await
      .map_err(Error::from_store)?;
    debug!(%club_id, user_id, "joined club");
    Ok(())
  }

  /// Remove `user_id` from the member set. A no-op if not a member.
  ///
  /// The leader may leave too; they stay leader of record.
  pub async fn leave_club(&self, club_id: Uuid, user_id: &str) -> Result<()> {
    self
      .store
      .update(club_id, ClubPatch::leave(user_id))
      .await
      .map_err(Error::from_store)?;
    debug!(%club_id, user_id, "left club");
    Ok(())
  }

  /// Delete a club on behalf of `actor`, who must be its leader.
  ///
  /// Deleting a club that is already gone succeeds.
  pub async fn delete_club(&self, club_id: Uuid, actor: &str) -> Result<()> {
    let Some(club) = self.store.get(club_id).await.map_err(Error::from_store)? else {
      debug!(%club_id, "delete of absent club");
      return Ok(());
    };

    if !club.is_leader(actor) {
      return Err(Error::NotAuthorized {
        actor: actor.to_owned(),
        action: "delete",
        club_id,
      });
    }

    self.store.delete(club_id).await.map_err(Error::from_store)?;
    info!(%club_id, actor, "club deleted");
    Ok(())
  }

  /// Edit descriptive fields on behalf of `actor`, who must be the leader or
  /// a moderator.
  pub async fn update_club(
    &self,
    club_id: Uuid,
    actor: &str,
    details: ClubDetails,
  ) -> Result<()> {
    let club = self
      .store
      .get(club_id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::ClubNotFound(club_id))?;

    if !club.is_leader(actor) && !club.is_moderator(actor) {
      return Err(Error::NotAuthorized {
        actor: actor.to_owned(),
        action: "edit",
        club_id,
      });
    }

    self
      .store
      .update(club_id, ClubPatch::from(details))
      .await
      .map_err(Error::from_store)
  }

  pub async fn get_club(&self, club_id: Uuid) -> Result<Club> {
    self
      .store
      .get(club_id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::ClubNotFound(club_id))
  }

  pub async fn list_clubs(&self) -> Result<Vec<Club>> {
    self.store.list().await.map_err(Error::from_store)
  }
}
