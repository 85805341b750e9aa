//! The `LedgerService` trait: the contract of the remote ledger store.
//!
//! The store is reached over an unreliable network, is atomic per single-row
//! update, is not transactional across rows, and offers no read-your-writes
//! guarantee. Higher layers (`muster-ledger`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  enrollment::{EnrollmentRecord, EnrollmentStatus},
  time::TimeEntry,
};

// ─── Error classification ────────────────────────────────────────────────────

/// A definite state conflict reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
  AlreadyOpen,
  NoOpenEntry,
  AlreadyRegistered,
  NotRegistered,
  AlreadyCheckedIn,
}

/// How a caller should react to a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// Timeout or 5xx-equivalent; safe to retry.
  Transient,
  /// The store refused because of its current state; never retried.
  Conflict(Conflict),
  /// Anything else; never retried.
  Fatal,
}

/// Implemented by every backend's error type.
pub trait Classify {
  fn class(&self) -> ErrorClass;
}

// ─── recordTime ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMark {
  Start,
  End,
}

/// Input to [`LedgerService::record_time`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRecord {
  pub subject_id:      String,
  pub mark:            TimeMark,
  pub actor_id:        String,
  pub actor_name:      String,
  /// Already normalised to the reference zone.
  pub at:              NaiveDateTime,
  /// Kept for audit; `at` is authoritative.
  pub tz_offset_hours: f64,
  /// For `Start`, a caller-chosen id makes the write idempotent; for `End`,
  /// the entry being closed.
  pub entry_id:        Option<Uuid>,
  pub note:            Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
  Open,
  Closed,
}

/// What [`LedgerService::record_time`] acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAck {
  pub id:     Uuid,
  pub status: EntryStatus,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the remote ledger store.
///
/// All methods return `Send` futures so implementations can be driven from
/// spawned tokio tasks.
pub trait LedgerService: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Time entries ──────────────────────────────────────────────────────

  /// Open (`Start`) or close (`End`) an entry.
  ///
  /// `Start` conflicts with `AlreadyOpen` when the subject has a different
  /// open entry, and is a no-op returning the existing entry when `entry_id`
  /// names an entry that already exists. `End` conflicts with `NoOpenEntry`
  /// when the named entry is not open.
  fn record_time(
    &self,
    record: TimeRecord,
  ) -> impl Future<Output = Result<RecordAck, Self::Error>> + Send + '_;

  /// The subject's open entry, if any.
  fn query_open_entry<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<TimeEntry>, Self::Error>> + Send + 'a;

  /// Every entry of the subject, in no particular order.
  fn query_entries<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Vec<TimeEntry>, Self::Error>> + Send + 'a;

  // ── Enrollment ────────────────────────────────────────────────────────

  /// `NotRegistered → Registered`. Conflicts with `AlreadyRegistered`
  /// otherwise.
  fn enroll_activity<'a>(
    &'a self,
    activity_id: &'a str,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<EnrollmentStatus, Self::Error>> + Send + 'a;

  /// `Registered → CheckedIn`. Conflicts with `NotRegistered` or
  /// `AlreadyCheckedIn`.
  fn check_in_activity<'a>(
    &'a self,
    activity_id: &'a str,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<EnrollmentStatus, Self::Error>> + Send + 'a;

  /// The current record; a never-seen pair reads as `NotRegistered`.
  fn query_enrollment<'a>(
    &'a self,
    activity_id: &'a str,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<EnrollmentRecord, Self::Error>> + Send + 'a;
}
