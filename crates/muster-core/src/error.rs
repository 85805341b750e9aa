//! Error types for `muster-core`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
  /// An ordinal outside the defined authority set reached a typed boundary.
  /// This is a programming error, never bad user input.
  #[error("authority level {0} is outside the defined ordinal set 0..=4")]
  UnknownAuthorityLevel(u8),

  #[error("unknown enrollment status code: {0}")]
  UnknownEnrollmentStatus(i64),

  #[error("invalid timezone offset: {0} hours")]
  InvalidTimezoneOffset(f64),

  #[error("timestamp out of range after applying a {minutes} minute offset")]
  TimestampOutOfRange { minutes: i32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
