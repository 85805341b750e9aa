//! Bounded, TTL-based cache of operation outcomes keyed by idempotency key.
//!
//! A replay inside the window gets the recorded outcome back without the
//! ledger being touched again.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use muster_core::request::Outcome;

use crate::{config::LedgerConfig, error::LedgerError};

pub type CachedResult = Result<Outcome, LedgerError>;

#[derive(Debug, Clone)]
struct Entry {
  result:      CachedResult,
  inserted_at: Instant,
}

#[derive(Debug)]
pub struct IdempotencyCache {
  entries:  DashMap<String, Entry>,
  ttl:      Duration,
  capacity: usize,
}

impl IdempotencyCache {
  pub fn new(ttl: Duration, capacity: usize) -> Self {
    Self { entries: DashMap::new(), ttl, capacity: capacity.max(1) }
  }

  pub fn from_config(config: &LedgerConfig) -> Self {
    Self::new(config.idempotency_ttl(), config.idempotency_capacity)
  }

  /// The live outcome recorded under `key`, if any.
  pub fn check(&self, key: &str) -> Option<CachedResult> {
    let entry = self.entries.get(key)?;
    (entry.inserted_at.elapsed() < self.ttl).then(|| entry.result.clone())
  }

  /// Record `result` under `key`. When full, expired entries go first, then
  /// an arbitrary tenth of what is left.
  pub fn insert(&self, key: String, result: CachedResult) {
    if self.entries.len() >= self.capacity {
      self.evict_expired();
    }
    if self.entries.len() >= self.capacity {
      let victims: Vec<String> = self
        .entries
        .iter()
        .take((self.capacity / 10).max(1))
        .map(|r| r.key().clone())
        .collect();
      for key in victims {
        self.entries.remove(&key);
      }
    }

    self.entries.insert(key, Entry { result, inserted_at: Instant::now() });
  }

  fn evict_expired(&self) {
    let ttl = self.ttl;
    self.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Default for IdempotencyCache {
  fn default() -> Self { Self::from_config(&LedgerConfig::default()) }
}
