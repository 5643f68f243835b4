//! Encoding and decoding helpers between [`Club`] and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs are hyphenated lowercase strings,
//! and id lists are compact JSON arrays.

use chrono::{DateTime, Utc};
use clubhouse_core::club::Club;
use uuid::Uuid;

use crate::{Error, Result};

/// Column list shared by every `SELECT` of a full club row, in the order
/// [`RawClub::from_row`] reads them.
pub const CLUB_COLUMNS: &str = "club_id, name, category, description, tags, leader_id, \
   leader_name, moderators, verified, private, members, capacity, created_at, updated_at, \
   recent_activity";

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_ids(ids: &[String]) -> Result<String> { Ok(serde_json::to_string(ids)?) }

pub fn decode_ids(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `clubs` row.
pub struct RawClub {
  pub club_id:         String,
  pub name:            String,
  pub category:        String,
  pub description:     String,
  pub tags:            String,
  pub leader_id:       String,
  pub leader_name:     String,
  pub moderators:      String,
  pub verified:        bool,
  pub private:         bool,
  pub members:         String,
  pub capacity:        Option<u32>,
  pub created_at:      String,
  pub updated_at:      String,
  pub recent_activity: Option<String>,
}

impl RawClub {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      club_id:         row.get(0)?,
      name:            row.get(1)?,
      category:        row.get(2)?,
      description:     row.get(3)?,
      tags:            row.get(4)?,
      leader_id:       row.get(5)?,
      leader_name:     row.get(6)?,
      moderators:      row.get(7)?,
      verified:        row.get(8)?,
      private:         row.get(9)?,
      members:         row.get(10)?,
      capacity:        row.get(11)?,
      created_at:      row.get(12)?,
      updated_at:      row.get(13)?,
      recent_activity: row.get(14)?,
    })
  }

  pub fn into_club(self) -> Result<Club> {
    Ok(Club {
      club_id:         decode_uuid(&self.club_id)?,
      name:            self.name,
      category:        self.category,
      description:     self.description,
      tags:            decode_ids(&self.tags)?,
      leader_id:       self.leader_id,
      leader_name:     self.leader_name,
      moderators:      decode_ids(&self.moderators)?,
      verified:        self.verified,
      private:         self.private,
      members:         decode_ids(&self.members)?,
      capacity:        self.capacity,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
      recent_activity: self.recent_activity,
    })
  }
}

/// A [`Club`] with every column already encoded, ready to bind.
pub struct EncodedClub {
  pub club_id:         String,
  pub name:            String,
  pub category:        String,
  pub description:     String,
  pub tags:            String,
  pub leader_id:       String,
  pub leader_name:     String,
  pub moderators:      String,
  pub verified:        bool,
  pub private:         bool,
  pub members:         String,
  pub capacity:        Option<u32>,
  pub created_at:      String,
  pub updated_at:      String,
  pub recent_activity: Option<String>,
}

impl EncodedClub {
  pub fn new(club: &Club) -> Result<Self> {
    Ok(Self {
      club_id:         encode_uuid(club.club_id),
      name:            club.name.clone(),
      category:        club.category.clone(),
      description:     club.description.clone(),
      tags:            encode_ids(&club.tags)?,
      leader_id:       club.leader_id.clone(),
      leader_name:     club.leader_name.clone(),
      moderators:      encode_ids(&club.moderators)?,
      verified:        club.verified,
      private:         club.private,
      members:         encode_ids(&club.members)?,
      capacity:        club.capacity,
      created_at:      encode_dt(club.created_at),
      updated_at:      encode_dt(club.updated_at),
      recent_activity: club.recent_activity.clone(),
    })
  }
}
