//! SQL schema for the Clubhouse SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per club. List-valued fields are JSON arrays of user ids and are
-- only ever rewritten inside the transaction that applied a patch.
-- There is deliberately no member_count column.
CREATE TABLE IF NOT EXISTS clubs (
    club_id          TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    category         TEXT NOT NULL,
    description      TEXT NOT NULL DEFAULT '',
    tags             TEXT NOT NULL DEFAULT '[]',
    leader_id        TEXT NOT NULL,
    leader_name      TEXT NOT NULL,
    moderators       TEXT NOT NULL DEFAULT '[]',
    verified         INTEGER NOT NULL DEFAULT 0,
    private          INTEGER NOT NULL DEFAULT 0,
    members          TEXT NOT NULL DEFAULT '[]',
    capacity         INTEGER,
    created_at       TEXT NOT NULL,   -- RFC 3339 UTC; store-assigned
    updated_at       TEXT NOT NULL,
    recent_activity  TEXT
);

CREATE INDEX IF NOT EXISTS clubs_leader_idx   ON clubs(leader_id);
CREATE INDEX IF NOT EXISTS clubs_category_idx ON clubs(category);
CREATE INDEX IF NOT EXISTS clubs_created_idx  ON clubs(created_at);

PRAGMA user_version = 1;
";
