//! [`Coordinator`]: the front door for every mutating ledger call.
//!
//! For each request the coordinator
//!
//! - resolves its idempotency key (caller-supplied, or derived from actor,
//!   subject, operation and a coarse time bucket),
//! - replays a cached outcome if the key was seen within the window,
//! - otherwise takes the request's single-writer lock, runs it on a detached
//!   task and caches the result.
//!
//! Detaching means a caller that gives up does not abort a mutation that may
//! already be in flight; the outcome still lands in the cache for the next
//! attempt with the same key.

use std::sync::Arc;

use dashmap::DashMap;
use muster_core::{
  request::{OperationKind, OperationRequest, Outcome},
  service::LedgerService,
  time::TimeSummary,
};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  config::LedgerConfig,
  enrollment::EnrollmentLedger,
  error::{LedgerError, Result},
  idempotency::IdempotencyCache,
  retry::RetryPolicy,
  time::TimeLedger,
  verify::{Verdict, VerifyPolicy},
};

/// Cheap to clone; clones share the cache and locks.
pub struct Coordinator<S> {
  inner: Arc<Inner<S>>,
}

impl<S> Clone for Coordinator<S> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

struct Inner<S> {
  time:            TimeLedger<S>,
  enrollment:      EnrollmentLedger<S>,
  cache:           IdempotencyCache,
  locks:           DashMap<String, Arc<Mutex<()>>>,
  key_bucket_secs: i64,
}

impl<S: LedgerService + 'static> Coordinator<S> {
  pub fn new(service: S, config: &LedgerConfig) -> Self {
    let service = Arc::new(service);
    let retry = RetryPolicy::from(config);
    let verify = VerifyPolicy::from(config);
    Self {
      inner: Arc::new(Inner {
        time:            TimeLedger::new(Arc::clone(&service), retry, verify),
        enrollment:      EnrollmentLedger::new(service, retry, verify),
        cache:           IdempotencyCache::from_config(config),
        locks:           DashMap::new(),
        key_bucket_secs: config.key_bucket_secs.max(1),
      }),
    }
  }

  /// Run `request` at most once per idempotency key.
  pub async fn submit(&self, request: OperationRequest) -> Result<Verdict<Outcome>> {
    let inner = Arc::clone(&self.inner);
    tokio::spawn(async move { inner.run(request).await })
      .await
      .map_err(|e| LedgerError::Service(format!("ledger task failed: {e}")))?
  }

  /// The key `request` is deduplicated under.
  pub fn idempotency_key(&self, request: &OperationRequest) -> String {
    self.inner.key_for(request)
  }

  pub async fn summary(&self, subject_id: &str, recent_limit: usize) -> Result<TimeSummary> {
    self.inner.time.summary(subject_id, recent_limit).await
  }
}

impl<S: LedgerService> Inner<S> {
  async fn run(&self, request: OperationRequest) -> Result<Verdict<Outcome>> {
    let key = self.key_for(&request);
    if let Some(cached) = self.cache.check(&key) {
      tracing::debug!(%key, op = request.kind.label(), "replaying cached outcome");
      return cached.map(Verdict::Confirmed);
    }

    let scope = request.writer_scope();
    let lock = Arc::clone(&self.locks.entry(scope.clone()).or_default());
    let result = {
      let _guard = lock.lock().await;

      // A concurrent holder of the same key may have finished while we waited.
      match self.cache.check(&key) {
        Some(cached) => {
          tracing::debug!(%key, op = request.kind.label(), "replaying outcome of concurrent call");
          cached.map(Verdict::Confirmed)
        }
        None => {
          let result = self.execute(&request, entry_id_for(&key)).await;
          match &result {
            Ok(Verdict::Confirmed(outcome)) => self.cache.insert(key.clone(), Ok(outcome.clone())),
            Err(e) if e.is_cacheable() => self.cache.insert(key.clone(), Err(e.clone())),
            Ok(Verdict::Indeterminate { .. }) | Err(_) => {}
          }
          result
        }
      }
    };

    drop(lock);
    self.locks.remove_if(&scope, |_, l| Arc::strong_count(l) == 1);
    result
  }

  async fn execute(&self, request: &OperationRequest, entry_id: Uuid) -> Result<Verdict<Outcome>> {
    let subject = request.subject_id.as_str();
    match &request.kind {
      OperationKind::TimeCheckIn => Ok(
        self
          .time
          .check_in(request, entry_id)
          .await?
          .map(Outcome::CheckedIn),
      ),
      OperationKind::TimeCheckOut { note } => Ok(
        self
          .time
          .check_out(request, note.clone())
          .await?
          .map(Outcome::CheckedOut),
      ),
      OperationKind::ActivityRegister { activity_id } => Ok(
        self
          .enrollment
          .register(activity_id, subject)
          .await?
          .map(Outcome::Registered),
      ),
      OperationKind::ActivityCheckIn { activity_id } => Ok(
        self
          .enrollment
          .check_in(activity_id, subject, request.actor_level)
          .await?
          .map(Outcome::ActivityCheckedIn),
      ),
    }
  }

  fn key_for(&self, request: &OperationRequest) -> String {
    match &request.idempotency_key {
      Some(key) => key.clone(),
      None => derive_key(request, self.key_bucket_secs),
    }
  }
}

/// Lowercase hex SHA-256 over actor, subject, operation, activity and the
/// time bucket of the client timestamp, newline-separated.
pub fn derive_key(request: &OperationRequest, bucket_secs: i64) -> String {
  let bucket = request
    .client_timestamp
    .and_utc()
    .timestamp()
    .div_euclid(bucket_secs.max(1));
  let material = format!(
    "{}\n{}\n{}\n{}\n{bucket}",
    request.actor_id,
    request.subject_id,
    request.kind.label(),
    request.kind.activity_id().unwrap_or_default(),
  );
  hex::encode(Sha256::digest(material.as_bytes()))
}

/// Entry ids are derived from the idempotency key so that a retried
/// check-in names the same entry as the attempt it repeats.
pub fn entry_id_for(key: &str) -> Uuid { Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()) }
