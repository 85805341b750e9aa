//! Projection of credentials and ledger results through a capability set.
//!
//! A field the observer may not see is replaced by [`REDACTED`], so the UI
//! shows that something is withheld. The one exception is `externalId`, which
//! is omitted when the credential never carried one.

use serde::{Serialize, Serializer};

use crate::{
  credential::{Affiliation, Credential, Organization},
  policy::CapabilitySet,
  request::Outcome,
  time::{TimeEntry, TimeSummary, format_minutes},
};

/// Fixed marker rendered in place of a withheld value.
pub const REDACTED: &str = "••••••";

// ─── Disclosed ───────────────────────────────────────────────────────────────

/// A value as the observer is allowed to see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disclosed<T> {
  Shown(T),
  /// Permitted, but the source has no value.
  Absent,
  Redacted,
}

impl<T> Disclosed<T> {
  /// Gate `value` on `allowed`. Presence is not leaked when redacting.
  pub fn gate(allowed: bool, value: Option<T>) -> Self {
    match (allowed, value) {
      (false, _) => Self::Redacted,
      (true, Some(v)) => Self::Shown(v),
      (true, None) => Self::Absent,
    }
  }

  pub fn is_redacted(&self) -> bool { matches!(self, Self::Redacted) }
}

impl<T: Serialize> Serialize for Disclosed<T> {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Shown(v) => v.serialize(s),
      Self::Absent => s.serialize_none(),
      Self::Redacted => s.serialize_str(REDACTED),
    }
  }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// What an observer sees of a scanned credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosedProfile {
  pub subject_id:   String,
  pub legal_name:   String,
  pub username:     String,
  pub role_label:   String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub organization: Option<Organization>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub affiliation:  Option<Affiliation>,
  pub contact:      Disclosed<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub external_id:  Option<Disclosed<String>>,
}

pub fn disclose(credential: &Credential, caps: &CapabilitySet) -> DisclosedProfile {
  DisclosedProfile {
    subject_id:   credential.subject_id.clone(),
    legal_name:   credential.legal_name.clone(),
    username:     credential.username.clone(),
    role_label:   credential.role.label.clone(),
    organization: credential.organization.clone(),
    affiliation:  credential.affiliation.clone(),
    contact:      Disclosed::gate(caps.can_view_contact, credential.contact.clone()),
    external_id:  credential
      .external_id
      .clone()
      .map(|id| Disclosed::gate(caps.can_view_external_id, Some(id))),
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// What an observer sees of a subject's volunteer time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosedSummary {
  pub subject_id:    String,
  pub total_minutes: Disclosed<i64>,
  pub open_since:    Disclosed<String>,
  pub recent:        Disclosed<Vec<TimeEntry>>,
}

pub fn disclose_summary(summary: &TimeSummary, caps: &CapabilitySet) -> DisclosedSummary {
  DisclosedSummary {
    subject_id:    summary.subject_id.clone(),
    total_minutes: Disclosed::gate(caps.can_view_aggregate_stats, Some(summary.total_minutes)),
    open_since:    Disclosed::gate(
      caps.can_view_recent_activity,
      summary.open.as_ref().map(|e| e.started_at.to_string()),
    ),
    recent:        Disclosed::gate(caps.can_view_recent_activity, Some(summary.recent.clone())),
  }
}

// ─── Confirmation ────────────────────────────────────────────────────────────

/// The human message for a confirmed outcome, re-projected through the
/// observer's capabilities. The running total is only appended when the
/// observer may see aggregate stats and a summary was fetched.
pub fn confirmation(
  outcome: &Outcome,
  caps: &CapabilitySet,
  subject: &Credential,
  summary: Option<&TimeSummary>,
) -> String {
  let name = &subject.legal_name;
  let mut msg = match outcome {
    Outcome::CheckedIn(entry) => {
      format!("{name} checked in at {}.", entry.started_at.format("%Y-%m-%d %H:%M"))
    }
    Outcome::CheckedOut(closed) => format!(
      "{name} checked out at {} after {}.",
      closed
        .entry
        .ended_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default(),
      format_minutes(closed.entry.credited_minutes()),
    ),
    Outcome::Registered(record) => {
      format!("{name} is registered for activity {}.", record.activity_id)
    }
    Outcome::ActivityCheckedIn(record) => {
      format!("{name} is checked in to activity {}.", record.activity_id)
    }
  };

  if let Some(summary) = summary.filter(|_| caps.can_view_aggregate_stats) {
    msg.push_str(&format!(" Total volunteer time: {}.", format_minutes(summary.total_minutes)));
  }
  msg
}
