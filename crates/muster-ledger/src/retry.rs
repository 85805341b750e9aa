//! Retry with exponential backoff and a per-attempt deadline.
//!
//! Only transient failures (timeouts and errors the service classifies as
//! [`ErrorClass::Transient`]) are retried. Conflicts and fatal errors return
//! after the attempt that produced them.

use std::{
  future::Future,
  sync::atomic::{AtomicU32, Ordering},
  time::Duration,
};

use backon::{ExponentialBuilder, Retryable};
use muster_core::service::{Classify, ErrorClass};
use thiserror::Error;

use crate::config::LedgerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub attempt_timeout: Duration,
  pub max_retries:     usize,
  pub initial_backoff: Duration,
  pub max_backoff:     Duration,
}

impl From<&LedgerConfig> for RetryPolicy {
  fn from(config: &LedgerConfig) -> Self {
    Self {
      attempt_timeout: config.attempt_timeout(),
      max_retries:     config.max_retries,
      initial_backoff: config.initial_backoff(),
      max_backoff:     config.max_backoff(),
    }
  }
}

/// Why one attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError<E> {
  #[error("attempt timed out after {0:?}")]
  Timeout(Duration),

  #[error("{0}")]
  Service(E),
}

impl<E: Classify> AttemptError<E> {
  pub fn class(&self) -> ErrorClass {
    match self {
      Self::Timeout(_) => ErrorClass::Transient,
      Self::Service(e) => e.class(),
    }
  }

  pub fn is_retryable(&self) -> bool { self.class() == ErrorClass::Transient }
}

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
  /// Every attempt failed transiently.
  #[error("gave up after {attempts} attempts: {last_error}")]
  Exhausted { attempts: u32, last_error: String },

  /// An attempt failed with a non-retryable error. `attempts > 1` means an
  /// earlier attempt may have taken effect without being acknowledged.
  #[error("{error}")]
  Rejected { attempts: u32, error: AttemptError<E> },
}

/// Run `operation` until it succeeds, fails non-transiently, or the retry
/// budget runs out.
pub async fn with_retry<F, Fut, T, E>(
  policy: &RetryPolicy,
  op: &'static str,
  mut operation: F,
) -> Result<T, RetryError<E>>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: std::error::Error + Classify,
{
  let backoff = ExponentialBuilder::default()
    .with_min_delay(policy.initial_backoff)
    .with_max_delay(policy.max_backoff)
    .with_max_times(policy.max_retries);

  let attempts = AtomicU32::new(0);
  let deadline = policy.attempt_timeout;

  let attempt = || {
    attempts.fetch_add(1, Ordering::SeqCst);
    let fut = operation();
    async move {
      match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(AttemptError::Service),
        Err(_) => Err(AttemptError::Timeout(deadline)),
      }
    }
  };

  let result = attempt
    .retry(backoff)
    .sleep(tokio::time::sleep)
    .when(|e: &AttemptError<E>| e.is_retryable())
    .notify(|err: &AttemptError<E>, dur: Duration| {
      tracing::debug!(
        op,
        attempt = attempts.load(Ordering::SeqCst),
        backoff_ms = dur.as_millis() as u64,
        error = %err,
        "retrying after backoff"
      );
    })
    .await;

  let attempts = attempts.load(Ordering::SeqCst);
  result.map_err(|error| {
    if error.is_retryable() {
      tracing::warn!(op, attempts, error = %error, "retry budget exhausted");
      RetryError::Exhausted { attempts, last_error: error.to_string() }
    } else {
      RetryError::Rejected { attempts, error }
    }
  })
}
