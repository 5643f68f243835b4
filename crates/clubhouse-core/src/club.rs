//! Club records and the partial patches applied to them.
//!
//! A [`Club`] is the only document the store holds. Writes never replace a
//! record wholesale; they go through a [`ClubPatch`], whose set-valued fields
//! use [`ArrayOp`] so that concurrent joins and leaves from different clients
//! compose without a read-modify-write cycle on the caller's side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─── Club ────────────────────────────────────────────────────────────────────

/// A named community record.
///
/// `members` keeps insertion order and holds each id at most once. There is
/// no stored member count; use [`Club::member_count`].
///
/// The leader is added to `members` on creation only. Nothing re-adds them if
/// they leave, so `leader_id ∈ members` is a convention, not an invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
  pub club_id:         Uuid,
  pub name:            String,
  pub category:        String,
  pub description:     String,
  #[serde(default)]
  pub tags:            Vec<String>,
  pub leader_id:       String,
  pub leader_name:     String,
  #[serde(default)]
  pub moderators:      Vec<String>,
  #[serde(default)]
  pub verified:        bool,
  #[serde(default)]
  pub private:         bool,
  #[serde(default)]
  pub members:         Vec<String>,
  pub capacity:        Option<u32>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  pub recent_activity: Option<String>,
}

impl Club {
  /// Build the record for a freshly created club. The creator becomes leader
  /// and sole member.
  pub fn from_new(club_id: Uuid, input: NewClub, now: DateTime<Utc>) -> Self {
    Self {
      club_id,
      members: vec![input.leader_id.clone()],
      name: input.name,
      category: input.category,
      description: input.description,
      tags: input.tags,
      leader_id: input.leader_id,
      leader_name: input.leader_name,
      moderators: Vec::new(),
      verified: false,
      private: input.private,
      capacity: input.capacity,
      created_at: now,
      updated_at: now,
      recent_activity: None,
    }
  }

  pub fn member_count(&self) -> usize { self.members.len() }

  pub fn is_member(&self, user_id: &str) -> bool {
    self.members.iter().any(|m| m == user_id)
  }

  pub fn is_leader(&self, user_id: &str) -> bool { self.leader_id == user_id }

  pub fn is_moderator(&self, user_id: &str) -> bool {
    self.moderators.iter().any(|m| m == user_id)
  }

  pub fn is_full(&self) -> bool {
    self
      .capacity
      .is_some_and(|cap| self.member_count() >= cap as usize)
  }

  /// Apply `patch` in place.
  ///
  /// Either the whole patch lands or nothing does. Returns whether any field
  /// actually changed; `updated_at` is bumped only in that case.
  pub fn apply(
    &mut self,
    patch: &ClubPatch,
    now: DateTime<Utc>,
  ) -> Result<bool, PatchError> {
    let members = patch
      .members
      .as_ref()
      .map(|op| op.applied_to(&self.members));

    if let (Some(new_members), Some(cap)) = (&members, self.capacity)
      && new_members.len() > self.members.len()
      && new_members.len() > cap as usize
    {
      return Err(PatchError::CapacityExceeded { capacity: cap });
    }

    let mut changed = false;

    if let Some(new_members) = members {
      changed |= replace(&mut self.members, new_members);
    }
    if let Some(op) = &patch.moderators {
      let moderators = op.applied_to(&self.moderators);
      changed |= replace(&mut self.moderators, moderators);
    }
    if let Some(name) = &patch.name {
      changed |= replace(&mut self.name, name.clone());
    }
    if let Some(category) = &patch.category {
      changed |= replace(&mut self.category, category.clone());
    }
    if let Some(description) = &patch.description {
      changed |= replace(&mut self.description, description.clone());
    }
    if let Some(tags) = &patch.tags {
      changed |= replace(&mut self.tags, tags.clone());
    }
    if let Some(verified) = patch.verified {
      changed |= replace(&mut self.verified, verified);
    }
    if let Some(activity) = &patch.recent_activity {
      changed |= replace(&mut self.recent_activity, Some(activity.clone()));
    }

    if changed {
      self.updated_at = now;
    }
    Ok(changed)
  }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
  if *slot == value {
    false
  } else {
    *slot = value;
    true
  }
}

// ─── NewClub ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ClubStore::create`]. The id and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClub {
  pub name:        String,
  pub category:    String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub tags:        Vec<String>,
  pub leader_id:   String,
  pub leader_name: String,
  #[serde(default)]
  pub private:     bool,
  pub capacity:    Option<u32>,
}

// ─── Patches ─────────────────────────────────────────────────────────────────

/// Set operator for list-valued fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "values", rename_all = "snake_case")]
pub enum ArrayOp {
  /// Append each value not already present, keeping existing order.
  Union(Vec<String>),
  /// Drop every occurrence of each value.
  Remove(Vec<String>),
}

impl ArrayOp {
  pub fn applied_to(&self, current: &[String]) -> Vec<String> {
    match self {
      Self::Union(values) => {
        let mut out = current.to_vec();
        for v in values {
          if !out.contains(v) {
            out.push(v.clone());
          }
        }
        out
      }
      Self::Remove(values) => current
        .iter()
        .filter(|m| !values.contains(m))
        .cloned()
        .collect(),
    }
  }
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubPatch {
  pub name:            Option<String>,
  pub category:        Option<String>,
  pub description:     Option<String>,
  pub tags:            Option<Vec<String>>,
  pub verified:        Option<bool>,
  pub recent_activity: Option<String>,
  pub members:         Option<ArrayOp>,
  pub moderators:      Option<ArrayOp>,
}

impl ClubPatch {
  pub fn join(user_id: impl Into<String>) -> Self {
    Self {
      members: Some(ArrayOp::Union(vec![user_id.into()])),
      ..Self::default()
    }
  }

  pub fn leave(user_id: impl Into<String>) -> Self {
    Self {
      members: Some(ArrayOp::Remove(vec![user_id.into()])),
      ..Self::default()
    }
  }
}

/// Editable descriptive fields, as accepted by
/// [`crate::membership::MembershipService::update_club`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClubDetails {
  pub name:            Option<String>,
  pub category:        Option<String>,
  pub description:     Option<String>,
  pub tags:            Option<Vec<String>>,
  pub recent_activity: Option<String>,
}

impl From<ClubDetails> for ClubPatch {
  fn from(d: ClubDetails) -> Self {
    Self {
      name: d.name,
      category: d.category,
      description: d.description,
      tags: d.tags,
      recent_activity: d.recent_activity,
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
  #[error("club is full (capacity {capacity})")]
  CapacityExceeded { capacity: u32 },
}
