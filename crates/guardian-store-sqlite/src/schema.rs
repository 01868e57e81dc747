//! SQL schema for the Guardian SQLite store.
//!
//! Run in full every time a store is opened. It only creates what is
//! missing, and stamps `PRAGMA user_version` for later migrations to check.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Local email/password accounts. Federated principals never appear here.
CREATE TABLE IF NOT EXISTS accounts (
    principal_id  TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,   -- normalised: trimmed, lowercase
    display_name  TEXT,
    password_hash TEXT NOT NULL,          -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- One row per principal. Every gate-relevant column is nullable: a NULL
-- status reads as 'enabled' and a NULL role reads as 'user'.
CREATE TABLE IF NOT EXISTS profiles (
    principal_id TEXT PRIMARY KEY,
    contact      TEXT,
    status       TEXT,                    -- 'new' | 'enabled' | 'disabled' | anything else
    role         TEXT,                    -- 'admin' | 'user'
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS profiles_status_idx ON profiles(status);

PRAGMA user_version = 1;
";
