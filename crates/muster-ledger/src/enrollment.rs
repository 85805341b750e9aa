//! The activity enrollment ledger: `NotRegistered → Registered → CheckedIn`,
//! forward only. Every mutation is read-verified.

use std::sync::Arc;

use muster_core::{
  authority::AuthorityLevel,
  enrollment::{EnrollmentRecord, EnrollmentStatus},
  service::{Conflict, LedgerService},
};

use crate::{
  error::{LedgerError, Result},
  retry::{RetryError, RetryPolicy, with_retry},
  time::{conflict_of, map_retry_error, require},
  verify::{Verdict, VerifyPolicy, verify},
};

/// Minimum authority to check anyone in to an activity.
pub const CHECK_IN_AUTHORITY: AuthorityLevel = AuthorityLevel::Associate;

/// Authority at which checking in an unregistered subject registers them
/// first instead of failing.
pub const OVERRIDE_AUTHORITY: AuthorityLevel = AuthorityLevel::Coordinator;

pub struct EnrollmentLedger<S> {
  service: Arc<S>,
  retry:   RetryPolicy,
  verify:  VerifyPolicy,
}

impl<S: LedgerService> EnrollmentLedger<S> {
  pub fn new(service: Arc<S>, retry: RetryPolicy, verify: VerifyPolicy) -> Self {
    Self { service, retry, verify }
  }

  /// Register `subject_id` for `activity_id`. Registering a subject who is
  /// already registered (or checked in) returns the existing record.
  pub async fn register(
    &self,
    activity_id: &str,
    subject_id: &str,
  ) -> Result<Verdict<EnrollmentRecord>> {
    let current = self.current(activity_id, subject_id).await?;
    if current.status != EnrollmentStatus::NotRegistered {
      tracing::debug!(activity_id, subject_id, status = %current.status, "already registered");
      return Ok(Verdict::Confirmed(current));
    }

    self.enroll(activity_id, subject_id).await
  }

  /// Check `subject_id` in to `activity_id`.
  ///
  /// An unregistered subject is refused with
  /// [`LedgerError::NotRegistered`], unless `actor_level` is at least
  /// [`OVERRIDE_AUTHORITY`], in which case the subject is registered first.
  pub async fn check_in(
    &self,
    activity_id: &str,
    subject_id: &str,
    actor_level: AuthorityLevel,
  ) -> Result<Verdict<EnrollmentRecord>> {
    require(actor_level, CHECK_IN_AUTHORITY)?;

    let current = self.current(activity_id, subject_id).await?;
    match current.status {
      EnrollmentStatus::CheckedIn => {
        return Err(LedgerError::AlreadyCheckedIn {
          activity_id: activity_id.to_owned(),
          subject_id:  subject_id.to_owned(),
        });
      }
      EnrollmentStatus::NotRegistered if actor_level < OVERRIDE_AUTHORITY => {
        return Err(LedgerError::NotRegistered {
          activity_id: activity_id.to_owned(),
          subject_id:  subject_id.to_owned(),
        });
      }
      EnrollmentStatus::NotRegistered => {
        tracing::info!(activity_id, subject_id, %actor_level, "registering on direct check-in");
        if let Verdict::Indeterminate { reads, detail } = self.enroll(activity_id, subject_id).await? {
          return Ok(Verdict::Indeterminate { reads, detail });
        }
      }
      EnrollmentStatus::Registered => {}
    }

    let result = with_retry(&self.retry, "check_in_activity", || {
      self.service.check_in_activity(activity_id, subject_id)
    })
    .await;

    match result {
      Ok(_) => {}
      Err(RetryError::Rejected { attempts, error })
        if attempts > 1 && conflict_of(&error) == Some(Conflict::AlreadyCheckedIn) => {}
      Err(e) => return Err(map_retry_error(e, Some(activity_id), subject_id)),
    }

    let verdict = self.confirm(activity_id, subject_id, EnrollmentStatus::CheckedIn).await;
    if verdict.is_confirmed() {
      tracing::info!(activity_id, subject_id, "checked in to activity");
    }
    Ok(verdict)
  }

  async fn enroll(&self, activity_id: &str, subject_id: &str) -> Result<Verdict<EnrollmentRecord>> {
    let result = with_retry(&self.retry, "enroll_activity", || {
      self.service.enroll_activity(activity_id, subject_id)
    })
    .await;

    match result {
      Ok(_) => {}
      // Someone, possibly an unacknowledged earlier attempt, got there first.
      Err(RetryError::Rejected { error, .. })
        if conflict_of(&error) == Some(Conflict::AlreadyRegistered) => {}
      Err(e) => return Err(map_retry_error(e, Some(activity_id), subject_id)),
    }

    let verdict = self.confirm(activity_id, subject_id, EnrollmentStatus::Registered).await;
    if verdict.is_confirmed() {
      tracing::info!(activity_id, subject_id, "registered for activity");
    }
    Ok(verdict)
  }

  async fn current(&self, activity_id: &str, subject_id: &str) -> Result<EnrollmentRecord> {
    with_retry(&self.retry, "query_enrollment", || {
      self.service.query_enrollment(activity_id, subject_id)
    })
    .await
    .map_err(|e| map_retry_error(e, Some(activity_id), subject_id))
  }

  /// Wait for the record to reach at least `target`.
  async fn confirm(
    &self,
    activity_id: &str,
    subject_id: &str,
    target: EnrollmentStatus,
  ) -> Verdict<EnrollmentRecord> {
    verify(
      &self.verify,
      "enrollment",
      || self.service.query_enrollment(activity_id, subject_id),
      |record: EnrollmentRecord| (record.status.stage() >= target.stage()).then_some(record),
    )
    .await
  }
}
