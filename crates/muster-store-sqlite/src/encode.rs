//! Conversions between domain types and the plain-text column
//! representations.
//!
//! Timestamps are RFC 3339 strings with microsecond precision; reference-zone
//! times are written as if they were UTC. UUIDs are hyphenated lowercase.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use muster_core::{
  enrollment::{EnrollmentRecord, EnrollmentStatus},
  time::TimeEntry,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_naive(dt: NaiveDateTime) -> String { encode_dt(dt.and_utc()) }

pub fn decode_naive(s: &str) -> Result<NaiveDateTime> { Ok(decode_dt(s)?.naive_utc()) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const ENTRY_COLUMNS: &str =
  "entry_id, subject_id, started_at, ended_at, recorded_by, recorded_by_name, note";

/// Raw strings read from a `time_entries` row, in [`ENTRY_COLUMNS`] order.
pub struct RawEntry {
  pub entry_id:         String,
  pub subject_id:       String,
  pub started_at:       String,
  pub ended_at:         Option<String>,
  pub recorded_by:      String,
  pub recorded_by_name: String,
  pub note:             Option<String>,
}

impl RawEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:         row.get(0)?,
      subject_id:       row.get(1)?,
      started_at:       row.get(2)?,
      ended_at:         row.get(3)?,
      recorded_by:      row.get(4)?,
      recorded_by_name: row.get(5)?,
      note:             row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<TimeEntry> {
    Ok(TimeEntry {
      id:               decode_uuid(&self.entry_id)?,
      subject_id:       self.subject_id,
      started_at:       decode_naive(&self.started_at)?,
      ended_at:         self.ended_at.as_deref().map(decode_naive).transpose()?,
      recorded_by:      self.recorded_by,
      recorded_by_name: self.recorded_by_name,
      note:             self.note,
    })
  }
}

/// Raw values read from an `enrollments` row.
pub struct RawEnrollment {
  pub activity_id:   String,
  pub subject_id:    String,
  pub status:        i64,
  pub registered_at: String,
  pub checked_in_at: Option<String>,
}

impl RawEnrollment {
  pub fn into_record(self) -> Result<EnrollmentRecord> {
    Ok(EnrollmentRecord {
      activity_id:   self.activity_id,
      subject_id:    self.subject_id,
      status:        EnrollmentStatus::from_code(self.status)?,
      registered_at: Some(decode_dt(&self.registered_at)?),
      checked_in_at: self.checked_in_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
