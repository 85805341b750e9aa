//! Authority levels and the role-label resolver.
//!
//! A role label is free text carried inside a scanned credential; the resolver
//! maps it onto a small closed ordinal set. Anything it does not recognise
//! lands on [`AuthorityLevel::Unknown`] rather than failing.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

use crate::{Error, Result};

// ─── AuthorityLevel ──────────────────────────────────────────────────────────

/// Ordinal rank governing disclosure and management capabilities.
///
/// Variants are declared in ascending order, so the derived `Ord` matches the
/// ordinal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  Serialize,
  Deserialize,
  EnumIter,
  IntoStaticStr,
)]
#[serde(into = "u8", try_from = "u8")]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum AuthorityLevel {
  /// Unrecognised role label.
  #[default]
  Unknown       = 0,
  Member        = 1,
  Associate     = 2,
  Coordinator   = 3,
  Administrator = 4,
}

impl AuthorityLevel {
  pub fn ordinal(self) -> u8 { self as u8 }

  /// Convert a raw ordinal. Values outside `0..=4` are an invariant
  /// violation and are reported as [`Error::UnknownAuthorityLevel`].
  pub fn from_ordinal(n: u8) -> Result<Self> {
    match n {
      0 => Ok(Self::Unknown),
      1 => Ok(Self::Member),
      2 => Ok(Self::Associate),
      3 => Ok(Self::Coordinator),
      4 => Ok(Self::Administrator),
      other => Err(Error::UnknownAuthorityLevel(other)),
    }
  }

  /// Snake-case name, e.g. `"coordinator"`.
  pub fn name(self) -> &'static str { self.into() }
}

impl From<AuthorityLevel> for u8 {
  fn from(level: AuthorityLevel) -> Self { level.ordinal() }
}

impl TryFrom<u8> for AuthorityLevel {
  type Error = Error;

  fn try_from(n: u8) -> Result<Self> { Self::from_ordinal(n) }
}

impl std::fmt::Display for AuthorityLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} ({})", self.name(), self.ordinal())
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Map a role label onto an [`AuthorityLevel`].
///
/// Total and pure: matching ignores ASCII case and surrounding whitespace, and
/// every unrecognised label yields [`AuthorityLevel::Unknown`].
pub fn resolve(role_label: &str) -> AuthorityLevel {
  match role_label.trim().to_ascii_lowercase().as_str() {
    "manage" | "admin" => AuthorityLevel::Administrator,
    "part_manage" | "part_admin" => AuthorityLevel::Coordinator,
    "staff" => AuthorityLevel::Associate,
    "common" | "user" => AuthorityLevel::Member,
    _ => AuthorityLevel::Unknown,
  }
}
