//! Idempotent, retry-safe volunteer-time and enrollment ledgers for Muster.
//!
//! Sits between the acting device and any [`LedgerService`] backend. The
//! backend may time out, lose acknowledgements and serve stale reads; this
//! crate retries, verifies and deduplicates so that each request takes effect
//! at most once and its result is either confirmed, definitely refused, or
//! explicitly [`Verdict::Indeterminate`].
//!
//! [`LedgerService`]: muster_core::service::LedgerService

pub mod config;
pub mod coordinator;
pub mod enrollment;
pub mod error;
pub mod idempotency;
pub mod retry;
pub mod time;
pub mod verify;

pub use config::LedgerConfig;
pub use coordinator::Coordinator;
pub use error::{ErrorCategory, LedgerError, Result};
pub use verify::Verdict;

#[cfg(test)]
mod tests;
