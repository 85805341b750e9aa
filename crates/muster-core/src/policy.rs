//! The disclosure policy engine.
//!
//! A [`CapabilitySet`] is a pure function of the observer's and the subject's
//! authority. It is recomputed for every interaction and never stored:
//! authority can change between two scans.

use serde::Serialize;

use crate::{
  authority::AuthorityLevel::{self, Administrator, Associate, Coordinator},
  credential::normalize_subject_id,
};

// ─── Principal ───────────────────────────────────────────────────────────────

/// One party of a scan: who they are and what authority they resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
  /// Normalised subject id.
  pub subject_id: String,
  pub level:      AuthorityLevel,
}

impl Principal {
  pub fn new(subject_id: &str, level: AuthorityLevel) -> Self {
    Self { subject_id: normalize_subject_id(subject_id), level }
  }

  pub fn is_same_identity(&self, other: &Principal) -> bool {
    self.subject_id == other.subject_id
  }
}

// ─── CapabilitySet ───────────────────────────────────────────────────────────

/// The graduated permissions of one observer over one subject.
///
/// Deliberately not `Deserialize`: a capability set is derived, never read
/// back from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySet {
  pub can_view_basic:           bool,
  pub can_view_contact:         bool,
  pub can_view_external_id:     bool,
  pub can_view_aggregate_stats: bool,
  pub can_view_recent_activity: bool,
  pub can_view_privileged:      bool,
  pub can_manage_time:          bool,
  pub can_manage_activity:      bool,
  pub is_superior:              bool,
}

impl CapabilitySet {
  /// Evaluate the level matrix for two distinct parties.
  pub fn compute(observer: AuthorityLevel, subject: AuthorityLevel) -> Self {
    let is_superior = observer > subject;
    let gap = i16::from(observer.ordinal()) - i16::from(subject.ordinal());

    Self {
      can_view_basic: true,
      can_view_contact: observer >= Associate || observer >= subject,
      can_view_external_id: observer >= Associate,
      can_view_aggregate_stats: observer >= Coordinator || is_superior,
      can_view_recent_activity: observer >= Associate,
      can_view_privileged: observer >= Administrator || gap >= 2,
      can_manage_time: observer >= Associate,
      can_manage_activity: observer >= Coordinator,
      is_superior,
    }
  }

  /// The same set with both management actions withdrawn.
  pub fn without_management(self) -> Self {
    Self { can_manage_time: false, can_manage_activity: false, ..self }
  }

  /// Whether any action at all is offered.
  pub fn can_manage_anything(&self) -> bool {
    self.can_manage_time || self.can_manage_activity
  }
}

/// Evaluate the policy for a concrete observer/subject pair.
///
/// When both parties are the same identity, management actions are withdrawn
/// whatever the level: nobody acts on themselves through a scan.
pub fn compute(observer: &Principal, subject: &Principal) -> CapabilitySet {
  let caps = CapabilitySet::compute(observer.level, subject.level);
  if observer.is_same_identity(subject) {
    caps.without_management()
  } else {
    caps
  }
}
