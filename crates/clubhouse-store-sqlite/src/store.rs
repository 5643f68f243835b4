//! [`SqliteStore`]: the SQLite implementation of [`ClubStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use clubhouse_core::{
  club::{Club, ClubPatch, NewClub},
  store::{ClubStore, ClubSubscription, SnapshotFeed},
};
use rusqlite::OptionalExtension as _;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{CLUB_COLUMNS, EncodedClub, RawClub, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A club store backed by a single SQLite file.
///
/// Cloning is cheap: the connection, the snapshot feed, and the write lock
/// are all shared between clones.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  feed:       SnapshotFeed,
  /// Held across write + re-read + publish so snapshots go out in write
  /// order.
  write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;

    let clubs = read_all(&conn).await?;
    debug!(clubs = clubs.len(), "sqlite store opened");

    Ok(Self {
      conn,
      feed: SnapshotFeed::new(clubs),
      write_lock: Arc::new(Mutex::new(())),
    })
  }

  pub fn subscriber_count(&self) -> usize { self.feed.subscriber_count() }

  /// Re-read the whole collection and hand it to subscribers. Callers hold
  /// `write_lock`.
  ///
  /// Runs after the write has committed, so a failed re-read is logged and
  /// subscribers keep the previous snapshot until the next write.
  async fn republish(&self) {
    match read_all(&self.conn).await {
      Ok(clubs) => self.feed.publish(clubs),
      Err(e) => warn!(error = %e, "club write committed but snapshot re-read failed"),
    }
  }
}

async fn read_all(conn: &tokio_rusqlite::Connection) -> Result<Vec<Club>> {
  let raws: Vec<RawClub> = conn
    .call(|conn| {
      let mut stmt = conn.prepare(&format!(
        "SELECT {CLUB_COLUMNS} FROM clubs ORDER BY created_at, club_id"
      ))?;
      let rows = stmt
        .query_map([], RawClub::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;

  raws.into_iter().map(RawClub::into_club).collect()
}

/// Read, patch, and write back one row inside a single transaction.
///
/// Returns whether the row changed. Nothing is written when the patch is a
/// no-op or is rejected.
fn apply_patch(
  conn: &mut rusqlite::Connection,
  club_id: Uuid,
  patch: &ClubPatch,
  now: DateTime<Utc>,
) -> Result<bool> {
  let tx = conn.transaction()?;

  let raw = tx
    .query_row(
      &format!("SELECT {CLUB_COLUMNS} FROM clubs WHERE club_id = ?1"),
      rusqlite::params![encode_uuid(club_id)],
      RawClub::from_row,
    )
    .optional()?
    .ok_or(Error::ClubNotFound(club_id))?;

  let mut club = raw.into_club()?;
  if !club.apply(patch, now)? {
    return Ok(false);
  }

  let row = EncodedClub::new(&club)?;
  tx.execute(
    "UPDATE clubs SET
       name = ?2, category = ?3, description = ?4, tags = ?5,
       moderators = ?6, verified = ?7, members = ?8,
       updated_at = ?9, recent_activity = ?10
     WHERE club_id = ?1",
    rusqlite::params![
      row.club_id,
      row.name,
      row.category,
      row.description,
      row.tags,
      row.moderators,
      row.verified,
      row.members,
      row.updated_at,
      row.recent_activity,
    ],
  )?;
  tx.commit()?;
  Ok(true)
}

// ─── ClubStore impl ──────────────────────────────────────────────────────────

impl ClubStore for SqliteStore {
  type Error = Error;

  async fn create(&self, input: NewClub) -> Result<Club> {
    let club = Club::from_new(Uuid::new_v4(), input, Utc::now());
    let row = EncodedClub::new(&club)?;

    let _guard = self.write_lock.lock().await;
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO clubs ({CLUB_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
          ),
          rusqlite::params![
            row.club_id,
            row.name,
            row.category,
            row.description,
            row.tags,
            row.leader_id,
            row.leader_name,
            row.moderators,
            row.verified,
            row.private,
            row.members,
            row.capacity,
            row.created_at,
            row.updated_at,
            row.recent_activity,
          ],
        )?;
        Ok(())
      })
      .await?;
    self.republish().await;

    Ok(club)
  }

  async fn get(&self, club_id: Uuid) -> Result<Option<Club>> {
    let id_str = encode_uuid(club_id);

    let raw: Option<RawClub> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CLUB_COLUMNS} FROM clubs WHERE club_id = ?1"),
              rusqlite::params![id_str],
              RawClub::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClub::into_club).transpose()
  }

  async fn list(&self) -> Result<Vec<Club>> { read_all(&self.conn).await }

  async fn update(&self, club_id: Uuid, patch: ClubPatch) -> Result<()> {
    let now = Utc::now();

    let _guard = self.write_lock.lock().await;
    let changed = self
      .conn
      .call(move |conn| Ok(apply_patch(conn, club_id, &patch, now)))
      .await??;

    if changed {
      self.republish().await;
    }
    Ok(())
  }

  async fn delete(&self, club_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(club_id);

    let _guard = self.write_lock.lock().await;
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM clubs WHERE club_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;

    if removed > 0 {
      self.republish().await;
    }
    Ok(())
  }

  async fn subscribe(&self) -> Result<ClubSubscription> { Ok(self.feed.subscribe()) }
}
