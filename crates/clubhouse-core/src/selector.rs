//! Partitioning of a club snapshot from one user's point of view.
//!
//! Each club lands in the first bucket it qualifies for:
//!
//! 1. `created`: the user is its leader, whatever the member set says;
//! 2. `joined`: the user is a member but not the leader;
//! 3. `joinable`: everything else, narrowed by [`ClubFilter`].
//!
//! The filter never hides created or joined clubs. `featured` is the verified
//! subset of `joinable` and so overlaps it.

use serde::{Deserialize, Serialize};

use crate::club::Club;

/// Category selection and free-text search applied to the joinable bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClubFilter {
  /// Exact category, compared case-insensitively. `None` or empty matches all.
  pub category: Option<String>,
  /// Case-insensitive substring over name, description, and tags.
  pub search:   Option<String>,
}

impl ClubFilter {
  pub fn matches(&self, club: &Club) -> bool {
    self.matches_category(club) && self.matches_search(club)
  }

  fn matches_category(&self, club: &Club) -> bool {
    match self.category.as_deref().map(str::trim) {
      None | Some("") => true,
      Some(cat) => club.category.eq_ignore_ascii_case(cat),
    }
  }

  fn matches_search(&self, club: &Club) -> bool {
    let needle = match self.search.as_deref().map(str::trim) {
      None | Some("") => return true,
      Some(s) => s.to_lowercase(),
    };

    club.name.to_lowercase().contains(&needle)
      || club.description.to_lowercase().contains(&needle)
      || club.tags.iter().any(|t| t.to_lowercase().contains(&needle))
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Partition {
  pub created:  Vec<Club>,
  pub joined:   Vec<Club>,
  pub joinable: Vec<Club>,
  pub featured: Vec<Club>,
}

pub fn partition(clubs: &[Club], user_id: &str, filter: &ClubFilter) -> Partition {
  let mut out = Partition::default();

  for club in clubs {
    if club.is_leader(user_id) {
      out.created.push(club.clone());
    } else if club.is_member(user_id) {
      out.joined.push(club.clone());
    } else if filter.matches(club) {
      if club.verified {
        out.featured.push(club.clone());
      }
      out.joinable.push(club.clone());
    }
  }

  out
}
