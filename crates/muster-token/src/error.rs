//! Error types for the muster-token codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("not an identity token: input lacks the `ID_` marker")]
  Format,

  #[error("identity token has an empty payload")]
  EmptyPayload,

  #[error("identity token payload is {len} characters; the limit is {max}")]
  Size { len: usize, max: usize },

  #[error("identity token payload is not valid {stage}: {detail}")]
  Encoding { stage: &'static str, detail: String },

  #[error("identity token schema error: {0}")]
  Schema(#[from] SchemaError),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Short machine-readable kind, e.g. `"size"`.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Format => "format",
      Self::EmptyPayload => "empty_payload",
      Self::Size { .. } => "size",
      Self::Encoding { .. } => "encoding",
      Self::Schema(_) => "schema",
      Self::Json(_) => "json",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
  #[error("payload is not a JSON object: {0}")]
  NotAnObject(String),

  #[error("required field `{0}` is missing or empty")]
  MissingField(&'static str),

  #[error("type tag is {found:?}, expected \"identity_v1\"")]
  WrongType { found: Option<String> },

  #[error("field `{field}` is malformed: {detail}")]
  InvalidField { field: &'static str, detail: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
