//! Credential → token.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use muster_core::credential::{Affiliation, Credential, Organization, Role, normalize_subject_id};
use serde::Serialize;

use crate::{DOCUMENT_TYPE, Error, MARKER, MAX_PAYLOAD_LEN, Result, SchemaError};

/// The canonical document.
///
/// Field order is the serialised order, so fields are declared in
/// lexicographic order of their JSON names. The nested types already are
/// (`id` < `name`, `label` < `level`).
#[derive(Serialize)]
struct Document<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  affiliation:  Option<&'a Affiliation>,
  #[serde(skip_serializing_if = "Option::is_none")]
  contact:      Option<&'a str>,
  #[serde(rename = "externalId", skip_serializing_if = "Option::is_none")]
  external_id:  Option<&'a str>,
  #[serde(rename = "legalName")]
  legal_name:   &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  organization: Option<&'a Organization>,
  role:         &'a Role,
  #[serde(rename = "subjectId")]
  subject_id:   String,
  #[serde(rename = "type")]
  kind:         &'static str,
  username:     &'a str,
}

/// Compact canonical JSON for `credential`.
pub(crate) fn canonical_json(credential: &Credential) -> Result<String> {
  for (name, value) in [
    ("subjectId", &credential.subject_id),
    ("legalName", &credential.legal_name),
    ("username", &credential.username),
  ] {
    if value.trim().is_empty() {
      return Err(SchemaError::MissingField(name).into());
    }
  }

  let doc = Document {
    affiliation:  credential.affiliation.as_ref(),
    contact:      credential.contact.as_deref(),
    external_id:  credential.external_id.as_deref(),
    legal_name:   &credential.legal_name,
    organization: credential.organization.as_ref(),
    role:         &credential.role,
    subject_id:   normalize_subject_id(&credential.subject_id),
    kind:         DOCUMENT_TYPE,
    username:     &credential.username,
  };
  Ok(serde_json::to_string(&doc)?)
}

pub(crate) fn encode(credential: &Credential) -> Result<String> {
  let json = canonical_json(credential)?;
  let escaped = urlencoding::encode(&json);
  let payload = STANDARD.encode(escaped.as_bytes());

  if payload.len() > MAX_PAYLOAD_LEN {
    return Err(Error::Size { len: payload.len(), max: MAX_PAYLOAD_LEN });
  }
  Ok(format!("{MARKER}{payload}"))
}
