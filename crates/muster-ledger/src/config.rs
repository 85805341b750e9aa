//! Tuning knobs for retries, verification and deduplication.

use std::time::Duration;

use serde::Deserialize;

/// Ledger settings. Every field has a default, so an empty config section
/// deserialises to [`LedgerConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
  /// Deadline for a single service call.
  pub attempt_timeout_ms:   u64,
  /// Retries after the first attempt for transient failures.
  pub max_retries:          usize,
  pub initial_backoff_ms:   u64,
  pub max_backoff_ms:       u64,
  /// Reads allowed when verifying a mutation.
  pub verify_reads:         usize,
  pub verify_backoff_ms:    u64,
  pub idempotency_ttl_secs: u64,
  pub idempotency_capacity: usize,
  /// Width of the time bucket used in derived idempotency keys.
  pub key_bucket_secs:      i64,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    Self {
      attempt_timeout_ms:   5_000,
      max_retries:          3,
      initial_backoff_ms:   100,
      max_backoff_ms:       2_000,
      verify_reads:         5,
      verify_backoff_ms:    50,
      idempotency_ttl_secs: 300,
      idempotency_capacity: 10_000,
      key_bucket_secs:      60,
    }
  }
}

impl LedgerConfig {
  pub fn attempt_timeout(&self) -> Duration { Duration::from_millis(self.attempt_timeout_ms) }

  pub fn initial_backoff(&self) -> Duration { Duration::from_millis(self.initial_backoff_ms) }

  pub fn max_backoff(&self) -> Duration { Duration::from_millis(self.max_backoff_ms) }

  pub fn verify_backoff(&self) -> Duration { Duration::from_millis(self.verify_backoff_ms) }

  pub fn idempotency_ttl(&self) -> Duration { Duration::from_secs(self.idempotency_ttl_secs) }
}
