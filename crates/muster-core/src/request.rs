//! Operation requests and their outcomes.
//!
//! An [`OperationRequest`] is the unit the coordinator deduplicates, retries
//! and serialises; an [`Outcome`] is what a confirmed request produced.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
  authority::AuthorityLevel,
  credential::normalize_subject_id,
  enrollment::EnrollmentRecord,
  time::{ClosedEntry, TimeEntry, TzOffset},
};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The administrative action being requested, with its specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
  TimeCheckIn,
  TimeCheckOut { note: Option<String> },
  ActivityRegister { activity_id: String },
  ActivityCheckIn { activity_id: String },
}

impl OperationKind {
  /// Stable label, used in derived idempotency keys and logs.
  pub fn label(&self) -> &'static str {
    match self {
      Self::TimeCheckIn => "time_check_in",
      Self::TimeCheckOut { .. } => "time_check_out",
      Self::ActivityRegister { .. } => "activity_register",
      Self::ActivityCheckIn { .. } => "activity_check_in",
    }
  }

  pub fn activity_id(&self) -> Option<&str> {
    match self {
      Self::ActivityRegister { activity_id } | Self::ActivityCheckIn { activity_id } => {
        Some(activity_id)
      }
      Self::TimeCheckIn | Self::TimeCheckOut { .. } => None,
    }
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// One mutating call as submitted by an acting device.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
  /// Caller-supplied key; when `None` the coordinator derives one.
  pub idempotency_key:  Option<String>,
  pub kind:             OperationKind,
  /// Normalised subject id.
  pub subject_id:       String,
  pub actor_id:         String,
  pub actor_name:       String,
  pub actor_level:      AuthorityLevel,
  /// The acting device's local clock reading.
  pub client_timestamp: NaiveDateTime,
  pub tz_offset:        TzOffset,
}

impl OperationRequest {
  pub fn new(
    kind: OperationKind,
    subject_id: &str,
    actor_id: &str,
    actor_name: &str,
    actor_level: AuthorityLevel,
    client_timestamp: NaiveDateTime,
    tz_offset: TzOffset,
  ) -> Self {
    Self {
      idempotency_key: None,
      kind,
      subject_id: normalize_subject_id(subject_id),
      actor_id: normalize_subject_id(actor_id),
      actor_name: actor_name.to_owned(),
      actor_level,
      client_timestamp,
      tz_offset,
    }
  }

  pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
    self.idempotency_key = Some(key.into());
    self
  }

  /// The single-writer scope this request mutates: a subject's time entries,
  /// or one (activity, subject) enrollment record.
  pub fn writer_scope(&self) -> String {
    match self.kind.activity_id() {
      Some(activity) => format!("activity/{activity}/{}", self.subject_id),
      None => format!("time/{}", self.subject_id),
    }
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// The confirmed effect of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum Outcome {
  CheckedIn(TimeEntry),
  CheckedOut(ClosedEntry),
  Registered(EnrollmentRecord),
  ActivityCheckedIn(EnrollmentRecord),
}
