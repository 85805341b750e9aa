//! Volunteer time entries and timezone normalisation.
//!
//! The ledger keeps every timestamp in one reference timezone. Clients report
//! a local clock reading plus the offset between their zone and the reference
//! zone; the ledger never guesses the acting device's timezone.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Largest accepted offset magnitude. Real zones span -12h..+14h; anything
/// past this is a client bug.
const MAX_OFFSET_HOURS: f64 = 26.0;

// ─── Offsets ─────────────────────────────────────────────────────────────────

/// Offset of the acting device's zone from the reference zone, held at
/// whole-minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TzOffset {
  minutes: i32,
}

impl TzOffset {
  pub const ZERO: Self = Self { minutes: 0 };

  /// Build from a (possibly fractional) hour count, e.g. `5.5` or `-3`.
  pub fn from_hours(hours: f64) -> Result<Self> {
    if !hours.is_finite() || hours.abs() > MAX_OFFSET_HOURS {
      return Err(Error::InvalidTimezoneOffset(hours));
    }
    Ok(Self { minutes: (hours * 60.0).round() as i32 })
  }

  pub fn from_minutes(minutes: i32) -> Result<Self> {
    Self::from_hours(f64::from(minutes) / 60.0)
  }

  pub fn minutes(self) -> i32 { self.minutes }

  pub fn hours(self) -> f64 { f64::from(self.minutes) / 60.0 }
}

/// Convert a client-local clock reading to the reference timezone by
/// subtracting the offset.
pub fn normalize(local: NaiveDateTime, offset: TzOffset) -> Result<NaiveDateTime> {
  local
    .checked_sub_signed(TimeDelta::minutes(i64::from(offset.minutes)))
    .ok_or(Error::TimestampOutOfRange { minutes: offset.minutes })
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// One check-in/check-out interval. Entries are append-only: a correction is a
/// new entry carrying a note, never an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
  pub id:               Uuid,
  pub subject_id:       String,
  /// Reference-zone timestamp.
  pub started_at:       NaiveDateTime,
  /// `None` while the interval is open.
  pub ended_at:         Option<NaiveDateTime>,
  pub recorded_by:      String,
  pub recorded_by_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note:             Option<String>,
}

impl TimeEntry {
  pub fn is_open(&self) -> bool { self.ended_at.is_none() }

  /// Elapsed time of a closed entry.
  pub fn duration(&self) -> Option<TimeDelta> {
    self.ended_at.map(|end| end - self.started_at)
  }

  /// Whole minutes credited for a closed entry (floored, never negative).
  pub fn credited_minutes(&self) -> i64 {
    self.duration().map_or(0, |d| d.num_minutes().max(0))
  }
}

/// A freshly closed entry together with its computed duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedEntry {
  pub entry:         TimeEntry,
  pub duration_secs: i64,
}

impl ClosedEntry {
  pub fn duration(&self) -> TimeDelta { TimeDelta::seconds(self.duration_secs) }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Aggregate view over one subject's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSummary {
  pub subject_id:    String,
  pub total_minutes: i64,
  pub open:          Option<TimeEntry>,
  /// Newest first.
  pub recent:        Vec<TimeEntry>,
}

impl TimeSummary {
  pub fn from_entries(
    subject_id: &str,
    mut entries: Vec<TimeEntry>,
    recent_limit: usize,
  ) -> Self {
    entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    let total_minutes = entries.iter().map(TimeEntry::credited_minutes).sum();
    let open = entries.iter().find(|e| e.is_open()).cloned();
    entries.truncate(recent_limit);
    Self {
      subject_id: subject_id.to_owned(),
      total_minutes,
      open,
      recent: entries,
    }
  }
}

/// Render a minute count the way operators read it: `2h 05m`, `45m`.
pub fn format_minutes(minutes: i64) -> String {
  let (h, m) = (minutes / 60, minutes % 60);
  if h > 0 { format!("{h}h {m:02}m") } else { format!("{m}m") }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
      .unwrap()
      .and_hms_opt(h, m, 0)
      .unwrap()
  }

  fn entry(start: NaiveDateTime, end: Option<NaiveDateTime>) -> TimeEntry {
    TimeEntry {
      id: Uuid::new_v4(),
      subject_id: "42".into(),
      started_at: start,
      ended_at: end,
      recorded_by: "1".into(),
      recorded_by_name: "Admin".into(),
      note: None,
    }
  }

  #[test]
  fn normalize_subtracts_offset() {
    let local = at(12, 0);
    assert_eq!(normalize(local, TzOffset::ZERO).unwrap(), local);
    assert_eq!(normalize(local, TzOffset::from_hours(3.0).unwrap()).unwrap(), at(9, 0));
    assert_eq!(normalize(local, TzOffset::from_hours(-2.5).unwrap()).unwrap(), at(14, 30));
  }

  #[test]
  fn offsets_are_validated() {
    assert!(TzOffset::from_hours(f64::NAN).is_err());
    assert!(TzOffset::from_hours(27.0).is_err());
    assert_eq!(TzOffset::from_hours(5.75).unwrap().minutes(), 345);
    assert_eq!(TzOffset::from_minutes(-90).unwrap().hours(), -1.5);
  }

  #[test]
  fn summary_totals_closed_entries_only() {
    let entries = vec![
      entry(at(8, 0), Some(at(9, 30))),
      entry(at(10, 0), Some(at(10, 45))),
      entry(at(11, 0), None),
    ];
    let summary = TimeSummary::from_entries("42", entries, 2);
    assert_eq!(summary.total_minutes, 135);
    assert_eq!(summary.open.as_ref().map(|e| e.started_at), Some(at(11, 0)));
    assert_eq!(summary.recent.len(), 2);
    assert_eq!(summary.recent[0].started_at, at(11, 0));
  }

  #[test]
  fn formats_minutes() {
    assert_eq!(format_minutes(45), "45m");
    assert_eq!(format_minutes(125), "2h 05m");
    assert_eq!(format_minutes(0), "0m");
  }
}
