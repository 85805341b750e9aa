//! The identity credential carried by a scanned token.
//!
//! Every string field is opaque display data. Nothing in this crate (or the
//! codec) interprets markup, script, or query-like content embedded in them.

use serde::{Deserialize, Serialize};

use crate::{
  authority::{AuthorityLevel, resolve},
  policy::Principal,
};

// ─── Sub-types ───────────────────────────────────────────────────────────────

/// The organisation a subject currently acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
  pub id:   String,
  pub name: String,
}

/// A looser affiliation, e.g. the subject's school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
  pub name: String,
}

/// The role as asserted by the token. `level` is informational only; the
/// effective authority always comes from resolving `label`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub label: String,
  pub level: u8,
}

// ─── Credential ──────────────────────────────────────────────────────────────

/// An immutable identity value: produced by encode, consumed by decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
  pub subject_id:   String,
  pub legal_name:   String,
  pub username:     String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contact:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub external_id:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub organization: Option<Organization>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub affiliation:  Option<Affiliation>,
  #[serde(default)]
  pub role:         Role,
}

impl Credential {
  /// Convenience constructor with the optional fields left empty.
  pub fn new(
    subject_id: impl Into<String>,
    legal_name: impl Into<String>,
    username: impl Into<String>,
    role: Role,
  ) -> Self {
    Self {
      subject_id: normalize_subject_id(&subject_id.into()),
      legal_name: legal_name.into(),
      username: username.into(),
      contact: None,
      external_id: None,
      organization: None,
      affiliation: None,
      role,
    }
  }

  /// Authority resolved from the role label.
  pub fn authority(&self) -> AuthorityLevel { resolve(&self.role.label) }

  /// The party this credential identifies, for policy evaluation.
  pub fn principal(&self) -> Principal {
    Principal::new(&self.subject_id, self.authority())
  }
}

// ─── Subject ids ─────────────────────────────────────────────────────────────

/// Canonical string form of a subject id.
///
/// A purely numeric id (ASCII digits only) loses its leading zeros, so
/// `"0042"` and `"42"` compare equal. Any other id is returned unchanged.
pub fn normalize_subject_id(raw: &str) -> String {
  if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
    return raw.to_owned();
  }
  let trimmed = raw.trim_start_matches('0');
  if trimmed.is_empty() { "0".to_owned() } else { trimmed.to_owned() }
}
