//! Error type for `muster-store-sqlite`.

use muster_core::service::{Classify, Conflict, ErrorClass};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] muster_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The write was refused because of the current ledger state.
  #[error("ledger conflict: {0:?}")]
  Conflict(Conflict),
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Conflict(c) => ErrorClass::Conflict(*c),
      Self::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
        if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
      {
        ErrorClass::Transient
      }
      _ => ErrorClass::Fatal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
