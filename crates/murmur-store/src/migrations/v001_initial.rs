//! v001 -- Initial schema creation.
//!
//! Creates the `users` and `messages` tables.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4 string
    username            TEXT NOT NULL UNIQUE,
    email               TEXT NOT NULL UNIQUE,
    password_hash       TEXT NOT NULL,              -- bcrypt
    avatar_image        TEXT,
    is_avatar_image_set INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    created_at          TEXT NOT NULL               -- RFC-3339, UTC
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
-- `seq` preserves insertion order for messages sharing a timestamp.
-- Participants are not foreign keys: identities are opaque to the relay.
CREATE TABLE IF NOT EXISTS messages (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    id           TEXT NOT NULL UNIQUE,              -- UUID v4
    sender_id    TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    text         TEXT NOT NULL,
    created_at   TEXT NOT NULL                      -- RFC-3339, UTC, fixed width
);

CREATE INDEX IF NOT EXISTS idx_messages_pair_ts
    ON messages(sender_id, recipient_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
