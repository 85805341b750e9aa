//! Activity enrollment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Where a subject stands for one activity. The wire codes (`0`, `-1`, `1`)
/// are the ones the ledger service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum EnrollmentStatus {
  NotRegistered,
  Registered,
  CheckedIn,
}

impl EnrollmentStatus {
  pub fn code(self) -> i64 {
    match self {
      Self::NotRegistered => 0,
      Self::Registered => -1,
      Self::CheckedIn => 1,
    }
  }

  pub fn from_code(code: i64) -> Result<Self> {
    match code {
      0 => Ok(Self::NotRegistered),
      -1 => Ok(Self::Registered),
      1 => Ok(Self::CheckedIn),
      other => Err(Error::UnknownEnrollmentStatus(other)),
    }
  }

  /// Position along the forward-only path.
  pub fn stage(self) -> u8 {
    match self {
      Self::NotRegistered => 0,
      Self::Registered => 1,
      Self::CheckedIn => 2,
    }
  }

  /// `true` if `next` is exactly one step forward from `self`.
  pub fn advances_to(self, next: Self) -> bool { next.stage() == self.stage() + 1 }
}

impl From<EnrollmentStatus> for i64 {
  fn from(s: EnrollmentStatus) -> Self { s.code() }
}

impl TryFrom<i64> for EnrollmentStatus {
  type Error = Error;

  fn try_from(code: i64) -> Result<Self> { Self::from_code(code) }
}

impl std::fmt::Display for EnrollmentStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::NotRegistered => "not registered",
      Self::Registered => "registered",
      Self::CheckedIn => "checked in",
    })
  }
}

/// One subject's progress through one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
  pub activity_id:   String,
  pub subject_id:    String,
  pub status:        EnrollmentStatus,
  pub registered_at: Option<DateTime<Utc>>,
  pub checked_in_at: Option<DateTime<Utc>>,
}

impl EnrollmentRecord {
  /// The implicit record of a pair the service has never seen.
  pub fn not_registered(activity_id: &str, subject_id: &str) -> Self {
    Self {
      activity_id:   activity_id.to_owned(),
      subject_id:    subject_id.to_owned(),
      status:        EnrollmentStatus::NotRegistered,
      registered_at: None,
      checked_in_at: None,
    }
  }
}
