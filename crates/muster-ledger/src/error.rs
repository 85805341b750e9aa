//! Error types for `muster-ledger`.

use chrono::NaiveDateTime;
use muster_core::{authority::AuthorityLevel, service::Conflict};
use thiserror::Error;

/// A ledger operation that definitely did not produce its intended effect.
///
/// `Clone` so a cached failure can be replayed to a later caller with the same
/// idempotency key. An inconclusive outcome is not an error; see
/// [`crate::Verdict::Indeterminate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
  #[error("actor has authority {actual}, {required} required")]
  InsufficientAuthority {
    required: AuthorityLevel,
    actual:   AuthorityLevel,
  },

  #[error("subject {subject_id} is already checked in")]
  AlreadyOpen { subject_id: String },

  #[error("subject {subject_id} has no open time entry")]
  NoOpenEntry { subject_id: String },

  #[error("check-out at {ended_at} precedes check-in at {started_at} for subject {subject_id}")]
  NegativeDuration {
    subject_id: String,
    started_at: NaiveDateTime,
    ended_at:   NaiveDateTime,
  },

  #[error("subject {subject_id} is already registered for activity {activity_id}")]
  AlreadyRegistered {
    activity_id: String,
    subject_id:  String,
  },

  #[error("subject {subject_id} is not registered for activity {activity_id}")]
  NotRegistered {
    activity_id: String,
    subject_id:  String,
  },

  #[error("subject {subject_id} is already checked in to activity {activity_id}")]
  AlreadyCheckedIn {
    activity_id: String,
    subject_id:  String,
  },

  #[error("gave up after {attempts} attempts: {last_error}")]
  RetryExhausted { attempts: u32, last_error: String },

  /// The service refused for a reason other than state.
  #[error("ledger service error: {0}")]
  Service(String),

  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

/// The failure taxonomy, for callers that branch on kind rather than
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
  Authorization,
  StateConflict,
  DataQuality,
  Transient,
  Service,
  InvalidRequest,
}

impl LedgerError {
  pub fn category(&self) -> ErrorCategory {
    match self {
      Self::InsufficientAuthority { .. } => ErrorCategory::Authorization,
      Self::AlreadyOpen { .. }
      | Self::NoOpenEntry { .. }
      | Self::AlreadyRegistered { .. }
      | Self::NotRegistered { .. }
      | Self::AlreadyCheckedIn { .. } => ErrorCategory::StateConflict,
      Self::NegativeDuration { .. } => ErrorCategory::DataQuality,
      Self::RetryExhausted { .. } => ErrorCategory::Transient,
      Self::Service(_) => ErrorCategory::Service,
      Self::InvalidRequest(_) => ErrorCategory::InvalidRequest,
    }
  }

  /// Whether a later identical request could succeed without anything
  /// changing in the ledger.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::RetryExhausted { .. }) }

  /// Whether the coordinator may replay this failure for the rest of the
  /// deduplication window.
  pub fn is_cacheable(&self) -> bool {
    matches!(
      self.category(),
      ErrorCategory::Authorization | ErrorCategory::StateConflict | ErrorCategory::DataQuality
    )
  }

  /// An operator-facing message saying what happened and what to do next.
  pub fn explain(&self) -> String {
    match self {
      Self::InsufficientAuthority { required, actual } => format!(
        "Your role ({}) cannot do this; ask someone with {} authority or above.",
        actual.name(),
        required.name()
      ),
      Self::AlreadyOpen { subject_id } => format!(
        "Volunteer {subject_id} is already checked in. Check them out before starting a new \
         session."
      ),
      Self::NoOpenEntry { subject_id } => format!(
        "Volunteer {subject_id} is not checked in, so there is nothing to check out. Check them \
         in first."
      ),
      Self::NegativeDuration { subject_id, started_at, ended_at } => format!(
        "Check-out time {ended_at} is before volunteer {subject_id}'s check-in at {started_at}. \
         Their session is still open; verify this device's clock and timezone, then check out \
         again."
      ),
      Self::AlreadyRegistered { activity_id, subject_id } => format!(
        "Volunteer {subject_id} is already registered for activity {activity_id}; no action \
         needed."
      ),
      Self::NotRegistered { activity_id, subject_id } => format!(
        "Volunteer {subject_id} has not registered for activity {activity_id}. Register them \
         first, or ask a coordinator to check them in directly."
      ),
      Self::AlreadyCheckedIn { activity_id, subject_id } => format!(
        "Volunteer {subject_id} is already checked in to activity {activity_id}; no action \
         needed."
      ),
      Self::RetryExhausted { attempts, .. } => format!(
        "The ledger did not respond after {attempts} attempts. Nothing was confirmed; scan again \
         when the connection recovers."
      ),
      Self::Service(detail) => {
        format!("The ledger refused the request ({detail}). Report this if it persists.")
      }
      Self::InvalidRequest(detail) => format!("The request was malformed: {detail}."),
    }
  }

  pub(crate) fn from_conflict(conflict: Conflict, activity_id: Option<&str>, subject_id: &str) -> Self {
    let subject_id = subject_id.to_owned();
    let activity_id = activity_id.unwrap_or_default().to_owned();
    match conflict {
      Conflict::AlreadyOpen => Self::AlreadyOpen { subject_id },
      Conflict::NoOpenEntry => Self::NoOpenEntry { subject_id },
      Conflict::AlreadyRegistered => Self::AlreadyRegistered { activity_id, subject_id },
      Conflict::NotRegistered => Self::NotRegistered { activity_id, subject_id },
      Conflict::AlreadyCheckedIn => Self::AlreadyCheckedIn { activity_id, subject_id },
    }
  }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
