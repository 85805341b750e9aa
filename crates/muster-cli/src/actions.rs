//! Ledger actions performed by one scanned party on another.
//!
//! Both parties arrive as identity tokens. The policy engine decides what the
//! actor may do; the coordinator carries out the request; the confirmed
//! outcome is re-projected through the same capability set before display.

use anyhow::{anyhow, bail};
use chrono::{Local, NaiveDateTime};
use muster_core::{
  credential::Credential,
  disclosure,
  policy::{self, CapabilitySet},
  request::{OperationKind, OperationRequest, Outcome},
  service::LedgerService,
  time::TzOffset,
};
use muster_ledger::{Coordinator, LedgerError, Verdict};
use serde::Serialize;

/// The two parties to an action, decoded and evaluated.
pub struct Scan {
  pub actor:   Credential,
  pub subject: Credential,
  pub caps:    CapabilitySet,
}

impl Scan {
  pub fn new(actor_token: &str, subject_token: &str) -> anyhow::Result<Self> {
    let actor = muster_token::decode(actor_token)?;
    let subject = muster_token::decode(subject_token)?;
    let caps = policy::compute(&actor.principal(), &subject.principal());
    Ok(Self { actor, subject, caps })
  }

  fn is_self(&self) -> bool { self.actor.principal().is_same_identity(&self.subject.principal()) }

  /// Refuse `kind` unless the capability set offers it.
  pub fn authorize(&self, kind: &OperationKind) -> anyhow::Result<()> {
    let allowed = match kind {
      OperationKind::TimeCheckIn | OperationKind::TimeCheckOut { .. } => self.caps.can_manage_time,
      OperationKind::ActivityCheckIn { .. } => self.caps.can_manage_activity,
      OperationKind::ActivityRegister { .. } => self.is_self() || self.caps.can_manage_activity,
    };
    if !allowed {
      bail!(
        "{} [{}] may not perform {} for {}",
        self.actor.legal_name,
        self.actor.authority(),
        kind.label(),
        self.subject.legal_name,
      );
    }
    Ok(())
  }

  pub fn request(&self, kind: OperationKind, clock: Clock) -> OperationRequest {
    OperationRequest::new(
      kind,
      &self.subject.subject_id,
      &self.actor.subject_id,
      &self.actor.legal_name,
      self.actor.authority(),
      clock.local,
      clock.offset,
    )
  }
}

/// The acting device's clock reading.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
  pub local:  NaiveDateTime,
  pub offset: TzOffset,
}

impl Clock {
  /// Read the host clock, or use the explicit overrides.
  ///
  /// `utc_hours` is the device's own offset from UTC; the ledger is handed
  /// that offset relative to its reference zone, `reference_hours` ahead of
  /// UTC.
  pub fn resolve(
    at: Option<NaiveDateTime>,
    utc_hours: Option<f64>,
    reference_hours: f64,
  ) -> anyhow::Result<Self> {
    let now = Local::now();
    let local_hours = utc_hours.unwrap_or_else(|| f64::from(now.offset().local_minus_utc()) / 3600.0);
    let offset = TzOffset::from_hours(local_hours - reference_hours)?;
    Ok(Self { local: at.unwrap_or_else(|| now.naive_local()), offset })
  }
}

#[derive(Serialize)]
struct Report<'a> {
  verdict: &'a Verdict<Outcome>,
  message: Option<String>,
}

/// Submit an authorised request and render the verdict as JSON.
pub async fn perform<S: LedgerService + 'static>(
  coordinator: &Coordinator<S>,
  scan: &Scan,
  kind: OperationKind,
  clock: Clock,
) -> anyhow::Result<String> {
  scan.authorize(&kind)?;
  let request = scan.request(kind, clock);
  let request_label = request.kind.label();
  let key = coordinator.idempotency_key(&request);
  tracing::debug!(%key, op = request.kind.label(), subject = %request.subject_id, "submitting");

  let verdict = coordinator.submit(request).await.map_err(explain)?;

  let message = match &verdict {
    Verdict::Confirmed(outcome) => {
      let summary = match outcome {
        Outcome::CheckedIn(_) | Outcome::CheckedOut(_) if scan.caps.can_view_aggregate_stats => {
          Some(coordinator.summary(&scan.subject.subject_id, 0).await.map_err(explain)?)
        }
        _ => None,
      };
      Some(disclosure::confirmation(outcome, &scan.caps, &scan.subject, summary.as_ref()))
    }
    Verdict::Indeterminate { reads, detail } => {
      tracing::warn!(reads, %detail, "outcome not confirmed");
      Some(format!(
        "Could not confirm {} for {} after {reads} reads. Check the ledger before submitting again.",
        request_label,
        scan.subject.legal_name,
      ))
    }
  };

  Ok(serde_json::to_string_pretty(&Report { verdict: &verdict, message })?)
}

/// The subject's time summary, redacted for the actor.
pub async fn summary<S: LedgerService + 'static>(
  coordinator: &Coordinator<S>,
  scan: &Scan,
  limit: usize,
) -> anyhow::Result<String> {
  let summary = coordinator.summary(&scan.subject.subject_id, limit).await.map_err(explain)?;
  let disclosed = disclosure::disclose_summary(&summary, &scan.caps);
  Ok(serde_json::to_string_pretty(&disclosed)?)
}

fn explain(err: LedgerError) -> anyhow::Error { anyhow!(err.explain()) }
