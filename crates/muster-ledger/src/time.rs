//! The volunteer time ledger: at most one open entry per subject.

use std::sync::Arc;

use muster_core::{
  authority::AuthorityLevel,
  request::OperationRequest,
  service::{Classify, Conflict, EntryStatus, ErrorClass, LedgerService, TimeMark, TimeRecord},
  time::{ClosedEntry, TimeEntry, TimeSummary, normalize},
};
use uuid::Uuid;

use crate::{
  error::{LedgerError, Result},
  retry::{AttemptError, RetryError, RetryPolicy, with_retry},
  verify::{Verdict, VerifyPolicy, verify},
};

/// Minimum authority to record time for anyone.
pub const TIME_AUTHORITY: AuthorityLevel = AuthorityLevel::Associate;

pub struct TimeLedger<S> {
  service: Arc<S>,
  retry:   RetryPolicy,
  verify:  VerifyPolicy,
}

impl<S: LedgerService> TimeLedger<S> {
  pub fn new(service: Arc<S>, retry: RetryPolicy, verify: VerifyPolicy) -> Self {
    Self { service, retry, verify }
  }

  /// Open a new entry for `request.subject_id` with id `entry_id`.
  ///
  /// The service decides whether the subject is already open. Starting an
  /// entry whose id is already stored is a no-op there, so a retry after a
  /// lost acknowledgement cannot open a second interval. The new entry is
  /// confirmed by reading it back.
  pub async fn check_in(
    &self,
    request: &OperationRequest,
    entry_id: Uuid,
  ) -> Result<Verdict<TimeEntry>> {
    require(request.actor_level, TIME_AUTHORITY)?;
    let started_at = normalize(request.client_timestamp, request.tz_offset)
      .map_err(|e| LedgerError::InvalidRequest(e.to_string()))?;
    let subject = request.subject_id.as_str();

    let record = TimeRecord {
      subject_id: subject.to_owned(),
      mark: TimeMark::Start,
      actor_id: request.actor_id.clone(),
      actor_name: request.actor_name.clone(),
      at: started_at,
      tz_offset_hours: request.tz_offset.hours(),
      entry_id: Some(entry_id),
      note: None,
    };

    match with_retry(&self.retry, "record_time", || self.service.record_time(record.clone())).await {
      Ok(ack) if ack.id != entry_id => {
        return Err(LedgerError::Service(format!(
          "service opened entry {} instead of {entry_id}",
          ack.id
        )));
      }
      Ok(_) => {}
      // An unacknowledged earlier attempt may be the open entry.
      Err(RetryError::Rejected { attempts, error })
        if attempts > 1 && conflict_of(&error) == Some(Conflict::AlreadyOpen) => {}
      Err(e) => return Err(into_ledger_error(e, subject)),
    }

    let verdict = verify(
      &self.verify,
      "check_in",
      || self.service.query_entries(subject),
      |entries: Vec<TimeEntry>| entries.into_iter().find(|e| e.id == entry_id),
    )
    .await;
    if verdict.is_confirmed() {
      tracing::info!(subject, %entry_id, %started_at, "checked in");
    }
    Ok(verdict)
  }

  /// Close the subject's open entry.
  ///
  /// A check-out that would end before the entry started fails with
  /// [`LedgerError::NegativeDuration`] and leaves the entry open.
  pub async fn check_out(
    &self,
    request: &OperationRequest,
    note: Option<String>,
  ) -> Result<Verdict<ClosedEntry>> {
    require(request.actor_level, TIME_AUTHORITY)?;
    let ended_at = normalize(request.client_timestamp, request.tz_offset)
      .map_err(|e| LedgerError::InvalidRequest(e.to_string()))?;
    let subject = request.subject_id.as_str();

    let open = self
      .open_entry(subject)
      .await?
      .ok_or_else(|| LedgerError::NoOpenEntry { subject_id: subject.to_owned() })?;

    if ended_at < open.started_at {
      tracing::warn!(subject, started_at = %open.started_at, %ended_at, "negative duration");
      return Err(LedgerError::NegativeDuration {
        subject_id: subject.to_owned(),
        started_at: open.started_at,
        ended_at,
      });
    }

    let id = open.id;
    let record = TimeRecord {
      subject_id: subject.to_owned(),
      mark: TimeMark::End,
      actor_id: request.actor_id.clone(),
      actor_name: request.actor_name.clone(),
      at: ended_at,
      tz_offset_hours: request.tz_offset.hours(),
      entry_id: Some(id),
      note,
    };

    match with_retry(&self.retry, "record_time", || self.service.record_time(record.clone())).await {
      Ok(ack) if ack.status == EntryStatus::Closed => {}
      Ok(ack) => {
        return Err(LedgerError::Service(format!(
          "entry {} still reported open after check-out",
          ack.id
        )));
      }
      Err(RetryError::Rejected { attempts, error })
        if attempts > 1 && conflict_of(&error) == Some(Conflict::NoOpenEntry) => {}
      Err(e) => return Err(into_ledger_error(e, subject)),
    }

    let verdict = verify(
      &self.verify,
      "check_out",
      || self.service.query_entries(subject),
      |entries: Vec<TimeEntry>| entries.into_iter().find(|e| e.id == id && !e.is_open()),
    )
    .await
    .map(|entry| {
      let duration_secs = entry.duration().map_or(0, |d| d.num_seconds());
      ClosedEntry { entry, duration_secs }
    });
    if let Verdict::Confirmed(closed) = &verdict {
      tracing::info!(subject, entry_id = %id, duration_secs = closed.duration_secs, "checked out");
    }
    Ok(verdict)
  }

  /// The subject's open entry. An absent entry is only believed once a
  /// second read agrees, since the first may predate the latest check-in.
  async fn open_entry(&self, subject: &str) -> Result<Option<TimeEntry>> {
    if let Some(entry) = self.read_open_entry(subject).await? {
      return Ok(Some(entry));
    }
    tokio::time::sleep(self.verify.backoff).await;
    let again = self.read_open_entry(subject).await?;
    if again.is_some() {
      tracing::debug!(subject, "open entry appeared on re-read");
    }
    Ok(again)
  }

  async fn read_open_entry(&self, subject: &str) -> Result<Option<TimeEntry>> {
    with_retry(&self.retry, "query_open_entry", || {
      self.service.query_open_entry(subject)
    })
    .await
    .map_err(|e| into_ledger_error(e, subject))
  }

  /// Totals and recent history for one subject. Read-only.
  pub async fn summary(&self, subject_id: &str, recent_limit: usize) -> Result<TimeSummary> {
    let entries = with_retry(&self.retry, "query_entries", || {
      self.service.query_entries(subject_id)
    })
    .await
    .map_err(|e| into_ledger_error(e, subject_id))?;
    Ok(TimeSummary::from_entries(subject_id, entries, recent_limit))
  }
}

pub(crate) fn require(actual: AuthorityLevel, required: AuthorityLevel) -> Result<()> {
  if actual < required {
    return Err(LedgerError::InsufficientAuthority { required, actual });
  }
  Ok(())
}

pub(crate) fn conflict_of<E: Classify>(error: &AttemptError<E>) -> Option<Conflict> {
  match error.class() {
    ErrorClass::Conflict(c) => Some(c),
    ErrorClass::Transient | ErrorClass::Fatal => None,
  }
}

fn into_ledger_error<E: std::error::Error + Classify>(err: RetryError<E>, subject: &str) -> LedgerError {
  map_retry_error(err, None, subject)
}

/// Translate a retry failure into the ledger taxonomy.
pub(crate) fn map_retry_error<E: std::error::Error + Classify>(
  err: RetryError<E>,
  activity_id: Option<&str>,
  subject_id: &str,
) -> LedgerError {
  match err {
    RetryError::Exhausted { attempts, last_error } => {
      LedgerError::RetryExhausted { attempts, last_error }
    }
    RetryError::Rejected { attempts, error } => match error.class() {
      ErrorClass::Conflict(c) => LedgerError::from_conflict(c, activity_id, subject_id),
      ErrorClass::Fatal => LedgerError::Service(error.to_string()),
      ErrorClass::Transient => LedgerError::RetryExhausted {
        attempts,
        last_error: error.to_string(),
      },
    },
  }
}
