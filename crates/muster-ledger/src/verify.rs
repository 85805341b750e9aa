//! Read-verification of mutations against an eventually consistent store.
//!
//! After a mutation the store may keep serving the old state for a while. A
//! mutation is confirmed once two consecutive reads both show the expected
//! state; if that does not happen within the read budget the result is
//! [`Verdict::Indeterminate`], which is neither success nor failure.

use std::{future::Future, time::Duration};

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::Serialize;

use crate::config::LedgerConfig;

/// The result of an operation whose effect had to be observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict<T> {
  Confirmed(T),
  /// The mutation may or may not have taken effect. Never cached; a repeat of
  /// the same request re-checks the ledger.
  Indeterminate { reads: usize, detail: String },
}

impl<T> Verdict<T> {
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Verdict<U> {
    match self {
      Self::Confirmed(v) => Verdict::Confirmed(f(v)),
      Self::Indeterminate { reads, detail } => Verdict::Indeterminate { reads, detail },
    }
  }

  pub fn confirmed(self) -> Option<T> {
    match self {
      Self::Confirmed(v) => Some(v),
      Self::Indeterminate { .. } => None,
    }
  }

  pub fn is_confirmed(&self) -> bool { matches!(self, Self::Confirmed(_)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
  pub max_reads:    usize,
  pub backoff:      Duration,
  pub max_backoff:  Duration,
  pub read_timeout: Duration,
}

impl From<&LedgerConfig> for VerifyPolicy {
  fn from(config: &LedgerConfig) -> Self {
    Self {
      max_reads:    config.verify_reads.max(2),
      backoff:      config.verify_backoff(),
      max_backoff:  config.max_backoff(),
      read_timeout: config.attempt_timeout(),
    }
  }
}

/// Re-read until two consecutive reads are accepted and agree.
///
/// `accept` maps a read to `Some(value)` when it shows the expected state.
/// Failed or timed-out reads break the streak like a stale read does.
pub async fn verify<R, T, E, F, Fut>(
  policy: &VerifyPolicy,
  what: &'static str,
  mut read: F,
  accept: impl Fn(R) -> Option<T>,
) -> Verdict<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<R, E>>,
  E: std::fmt::Display,
  T: PartialEq,
{
  let mut delays = ExponentialBuilder::default()
    .with_min_delay(policy.backoff)
    .with_max_delay(policy.max_backoff)
    .with_max_times(policy.max_reads)
    .build();

  let mut previous: Option<T> = None;
  let mut detail = String::from("reads kept showing the previous state");

  for n in 1..=policy.max_reads {
    let seen = match tokio::time::timeout(policy.read_timeout, read()).await {
      Ok(Ok(raw)) => accept(raw),
      Ok(Err(e)) => {
        detail = format!("read failed: {e}");
        None
      }
      Err(_) => {
        detail = format!("read timed out after {:?}", policy.read_timeout);
        None
      }
    };
    tracing::debug!(what, read = n, accepted = seen.is_some(), "verification read");

    match (seen, previous.take()) {
      (Some(now), Some(before)) if now == before => return Verdict::Confirmed(now),
      (Some(now), _) => previous = Some(now),
      (None, _) => {}
    }

    if n < policy.max_reads {
      if let Some(delay) = delays.next() {
        tokio::time::sleep(delay).await;
      }
    }
  }

  tracing::warn!(what, reads = policy.max_reads, %detail, "verification inconclusive");
  Verdict::Indeterminate { reads: policy.max_reads, detail }
}
