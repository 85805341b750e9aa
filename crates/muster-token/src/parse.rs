//! Token → credential.
//!
//! Each stage rejects with its own error kind, in a fixed order. The length
//! check runs before any decoding, so work is bounded whatever the input.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use muster_core::credential::{Affiliation, Credential, Organization, Role, normalize_subject_id};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{DOCUMENT_TYPE, Error, MARKER, MAX_PAYLOAD_LEN, Result, SchemaError};

const REQUIRED: [&str; 3] = ["subjectId", "legalName", "username"];

// ─── Wire shapes ─────────────────────────────────────────────────────────────

/// Ids arrive as strings from some encoders and as integers from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
  Text(String),
  Number(u64),
}

impl WireId {
  /// The id as carried, with integers rendered in decimal.
  fn into_text(self) -> String {
    match self {
      Self::Text(s) => s,
      Self::Number(n) => n.to_string(),
    }
  }
}

#[derive(Deserialize)]
struct WireOrganization {
  id:   WireId,
  name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
  subject_id:   WireId,
  legal_name:   String,
  username:     String,
  #[serde(default)]
  contact:      Option<String>,
  #[serde(default)]
  external_id:  Option<String>,
  #[serde(default)]
  organization: Option<WireOrganization>,
  #[serde(default)]
  affiliation:  Option<Affiliation>,
  #[serde(default)]
  role:         Option<Role>,
}

// ─── Stages ──────────────────────────────────────────────────────────────────

pub(crate) fn decode(token: &str) -> Result<Credential> {
  let payload = token
    .trim()
    .strip_prefix(MARKER)
    .ok_or(Error::Format)?
    .trim();

  if payload.is_empty() {
    return Err(Error::EmptyPayload);
  }
  if payload.len() > MAX_PAYLOAD_LEN {
    return Err(Error::Size { len: payload.len(), max: MAX_PAYLOAD_LEN });
  }

  let escaped = STANDARD
    .decode(payload)
    .map_err(|e| Error::Encoding { stage: "base64", detail: e.to_string() })?;

  let json = String::from_utf8(urlencoding::decode_binary(&escaped).into_owned())
    .map_err(|e| Error::Encoding { stage: "percent-encoded UTF-8", detail: e.to_string() })?;

  let object = match serde_json::from_str::<Value>(&json) {
    Ok(Value::Object(map)) => map,
    Ok(other) => return Err(SchemaError::NotAnObject(json_kind(&other).to_owned()).into()),
    Err(e) => return Err(SchemaError::NotAnObject(e.to_string()).into()),
  };

  check_required(&object)?;
  check_type(&object)?;
  into_credential(object)
}

fn check_required(object: &Map<String, Value>) -> Result<()> {
  for field in REQUIRED {
    let present = match object.get(field) {
      Some(Value::String(s)) => !s.trim().is_empty(),
      Some(Value::Number(_)) => field == "subjectId",
      _ => false,
    };
    if !present {
      return Err(SchemaError::MissingField(field).into());
    }
  }
  Ok(())
}

fn check_type(object: &Map<String, Value>) -> Result<()> {
  match object.get("type") {
    Some(Value::String(t)) if t == DOCUMENT_TYPE => Ok(()),
    Some(Value::String(t)) => Err(SchemaError::WrongType { found: Some(t.clone()) }.into()),
    Some(other) => Err(SchemaError::WrongType { found: Some(other.to_string()) }.into()),
    None => Err(SchemaError::WrongType { found: None }.into()),
  }
}

fn into_credential(object: Map<String, Value>) -> Result<Credential> {
  let doc: WireDocument = serde_json::from_value(Value::Object(object)).map_err(|e| {
    SchemaError::InvalidField { field: "document", detail: e.to_string() }
  })?;

  Ok(Credential {
    subject_id:   normalize_subject_id(&doc.subject_id.into_text()),
    legal_name:   doc.legal_name,
    username:     doc.username,
    contact:      doc.contact,
    external_id:  doc.external_id,
    organization: doc
      .organization
      .map(|o| Organization { id: o.id.into_text(), name: o.name }),
    affiliation:  doc.affiliation,
    role:         doc.role.unwrap_or_default(),
  })
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
