//! SQL schema for the Muster SQLite ledger.
//!
//! Executed once at connection startup. Later migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Entries are append-only apart from closing: the only UPDATE ever issued
-- sets the end columns of a row whose ended_at is NULL.
CREATE TABLE IF NOT EXISTS time_entries (
    entry_id           TEXT PRIMARY KEY,
    subject_id         TEXT NOT NULL,
    started_at         TEXT NOT NULL,   -- reference zone, RFC 3339
    ended_at           TEXT,            -- NULL while open
    start_offset_hours REAL NOT NULL,   -- as reported by the acting device
    end_offset_hours   REAL,
    recorded_by        TEXT NOT NULL,
    recorded_by_name   TEXT NOT NULL,
    closed_by          TEXT,
    closed_by_name     TEXT,
    note               TEXT,
    recorded_at        TEXT NOT NULL    -- server clock, RFC 3339 UTC
);

-- At most one open entry per subject.
CREATE UNIQUE INDEX IF NOT EXISTS time_entries_one_open
    ON time_entries(subject_id) WHERE ended_at IS NULL;

CREATE INDEX IF NOT EXISTS time_entries_subject_idx ON time_entries(subject_id);

-- A missing row means NotRegistered (0).
CREATE TABLE IF NOT EXISTS enrollments (
    activity_id   TEXT NOT NULL,
    subject_id    TEXT NOT NULL,
    status        INTEGER NOT NULL CHECK (status IN (-1, 1)),
    registered_at TEXT NOT NULL,
    checked_in_at TEXT,
    PRIMARY KEY (activity_id, subject_id),
    CHECK ((status = 1) = (checked_in_at IS NOT NULL))
);

PRAGMA user_version = 1;
";
