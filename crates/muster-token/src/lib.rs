//! Identity token codec for Muster.
//!
//! Converts between [`Credential`] values and the scannable token string.
//! Pure synchronous; no I/O.
//!
//! # Wire contract
//!
//! Any runtime that encodes or decodes tokens implements exactly these steps:
//!
//! 1. Compact JSON, object keys in lexicographic byte order at every level,
//!    absent optional fields omitted, `"type":"identity_v1"`.
//! 2. Percent-encode every byte outside `A-Z a-z 0-9 - . _ ~` (uppercase
//!    hex).
//! 3. Standard base64 with `=` padding.
//! 4. Prefix `ID_`. The base64 part is at most 2000 characters.
//!
//! ```no_run
//! use muster_core::credential::{Credential, Role};
//!
//! let c = Credential::new("42", "Jie", "jie", Role { label: "staff".into(), level: 2 });
//! let token = muster_token::encode(&c).unwrap();
//! assert_eq!(muster_token::decode(&token).unwrap(), c);
//! ```

pub mod error;
mod parse;
mod serialize;

pub use error::{Error, Result, SchemaError};
use muster_core::credential::Credential;

/// Literal prefix of every token.
pub const MARKER: &str = "ID_";

/// Value of the document's `type` tag.
pub const DOCUMENT_TYPE: &str = "identity_v1";

/// Upper bound on the payload after the marker.
pub const MAX_PAYLOAD_LEN: usize = 2000;

/// Encode `credential` as a token.
///
/// Fails with [`Error::Size`] rather than produce a token scanners would
/// reject, and with [`SchemaError::MissingField`] if a required field is
/// empty.
pub fn encode(credential: &Credential) -> Result<String> { serialize::encode(credential) }

/// Decode and validate a token.
pub fn decode(token: &str) -> Result<Credential> { parse::decode(token) }

/// Decode raw scanner output. Input that is not UTF-8 is a format error.
pub fn decode_bytes(raw: &[u8]) -> Result<Credential> {
  let token = std::str::from_utf8(raw).map_err(|_| Error::Format)?;
  decode(token)
}

#[cfg(test)]
mod tests {
  use base64::{Engine as _, engine::general_purpose::STANDARD};
  use muster_core::credential::{Affiliation, Organization, Role};

  use super::*;

  const JIE_TOKEN: &str = "ID_JTdCJTIybGVnYWxOYW1lJTIyJTNBJTIySmllJTIyJTJDJTIycm9sZSUyMiUzQSU3QiUyMmxhYmVsJTIyJTNBJTIycGFydF9hZG1pbiUyMiUyQyUyMmxldmVsJTIyJTNBMyU3RCUyQyUyMnN1YmplY3RJZCUyMiUzQSUyMjQyJTIyJTJDJTIydHlwZSUyMiUzQSUyMmlkZW50aXR5X3YxJTIyJTJDJTIydXNlcm5hbWUlMjIlM0ElMjJqaWUlMjIlN0Q=";

  fn jie() -> Credential {
    Credential::new("42", "Jie", "jie", Role { label: "part_admin".into(), level: 3 })
  }

  fn full() -> Credential {
    Credential {
      contact: Some("jie@example.com".into()),
      external_id: Some("S-2025-0042".into()),
      organization: Some(Organization { id: "1".into(), name: "Student Union".into() }),
      affiliation: Some(Affiliation { name: "UC Davis".into() }),
      ..jie()
    }
  }

  /// Wrap an arbitrary JSON text the way the contract does.
  fn wrap(json: &str) -> String {
    format!("{MARKER}{}", STANDARD.encode(urlencoding::encode(json).as_bytes()))
  }

  // ── Encoding ────────────────────────────────────────────────────────────

  #[test]
  fn encodes_to_golden_bytes() {
    let token = encode(&jie()).unwrap();
    assert!(token.starts_with("ID_"));
    assert_eq!(token, JIE_TOKEN);
  }

  #[test]
  fn canonical_json_sorts_keys_and_omits_absent_fields() {
    let json = serialize::canonical_json(&full()).unwrap();
    assert_eq!(
      json,
      r#"{"affiliation":{"name":"UC Davis"},"contact":"jie@example.com","externalId":"S-2025-0042","legalName":"Jie","organization":{"id":"1","name":"Student Union"},"role":{"label":"part_admin","level":3},"subjectId":"42","type":"identity_v1","username":"jie"}"#
    );
  }

  #[test]
  fn round_trips_field_for_field() {
    for c in [jie(), full()] {
      assert_eq!(decode(&encode(&c).unwrap()).unwrap(), c);
    }
  }

  #[test]
  fn round_trips_non_ascii_and_markup_verbatim() {
    let c = Credential {
      legal_name: "李杰 <script>alert('x')</script>".into(),
      contact: Some("a=1&b=%20;DROP TABLE".into()),
      ..jie()
    };
    assert_eq!(decode(&encode(&c).unwrap()).unwrap(), c);
  }

  #[test]
  fn encoder_refuses_oversized_credentials() {
    let c = Credential { legal_name: "x".repeat(1500), ..jie() };
    assert!(matches!(encode(&c), Err(Error::Size { max: MAX_PAYLOAD_LEN, .. })));
  }

  #[test]
  fn encoder_refuses_empty_required_fields() {
    let c = Credential { username: " ".into(), ..jie() };
    assert!(matches!(
      encode(&c),
      Err(Error::Schema(SchemaError::MissingField("username")))
    ));
  }

  // ── Decoding ────────────────────────────────────────────────────────────

  #[test]
  fn decodes_golden_token() {
    assert_eq!(decode(JIE_TOKEN).unwrap(), jie());
  }

  #[test]
  fn tolerates_surrounding_whitespace() {
    assert_eq!(decode(&format!("  {JIE_TOKEN}\n")).unwrap(), jie());
  }

  #[test]
  fn accepts_js_style_escaping_and_numeric_ids() {
    // `!'()` left literal, as encodeURIComponent does; subjectId as a number.
    let token = "ID_JTdCJTIybGVnYWxOYW1lJTIyJTNBJTIyTydOZWlsJTIwKHgpISUyMiUyQyUyMnN1YmplY3RJZCUyMiUzQTQyJTJDJTIydHlwZSUyMiUzQSUyMmlkZW50aXR5X3YxJTIyJTJDJTIydXNlcm5hbWUlMjIlM0ElMjJvbiUyMiU3RA==";
    let c = decode(token).unwrap();
    assert_eq!(c.legal_name, "O'Neil (x)!");
    assert_eq!(c.subject_id, "42");
    assert_eq!(c.role, Role::default());
  }

  #[test]
  fn normalises_numeric_subject_ids() {
    let token = wrap(r#"{"legalName":"A","subjectId":"0042","type":"identity_v1","username":"a"}"#);
    assert_eq!(decode(&token).unwrap().subject_id, "42");
  }

  #[test]
  fn keeps_organization_id_verbatim() {
    let c = Credential {
      organization: Some(Organization { id: "007".into(), name: "Chapter".into() }),
      ..jie()
    };
    assert_eq!(decode(&encode(&c).unwrap()).unwrap(), c);

    let token = wrap(
      r#"{"legalName":"A","organization":{"id":7,"name":"C"},"subjectId":"1","type":"identity_v1","username":"a"}"#,
    );
    assert_eq!(decode(&token).unwrap().organization.unwrap().id, "7");
  }

  #[test]
  fn rejects_missing_marker() {
    assert!(matches!(decode("VG_USER_abc"), Err(Error::Format)));
    assert!(matches!(decode(""), Err(Error::Format)));
    assert!(matches!(decode_bytes(&[0x49, 0x44, 0x5f, 0xff]), Err(Error::Format)));
  }

  #[test]
  fn rejects_empty_payload() {
    assert!(matches!(decode("ID_"), Err(Error::EmptyPayload)));
    assert!(matches!(decode("ID_   "), Err(Error::EmptyPayload)));
  }

  #[test]
  fn rejects_oversized_payload_before_decoding() {
    // Not valid base64 either; size must win.
    let token = format!("ID_{}", "!".repeat(MAX_PAYLOAD_LEN + 1));
    assert!(matches!(decode(&token), Err(Error::Size { len, .. }) if len == MAX_PAYLOAD_LEN + 1));
  }

  #[test]
  fn rejects_invalid_base64() {
    let err = decode("ID_not*base64").unwrap_err();
    assert!(matches!(err, Error::Encoding { stage: "base64", .. }));
    assert_eq!(err.kind(), "encoding");
  }

  #[test]
  fn rejects_invalid_utf8_after_percent_decoding() {
    let token = format!("ID_{}", STANDARD.encode("%FF%FE"));
    assert!(matches!(decode(&token), Err(Error::Encoding { stage: "percent-encoded UTF-8", .. })));
  }

  #[test]
  fn rejects_non_object_payloads() {
    for json in ["[1,2]", "\"str\"", "not json"] {
      assert!(
        matches!(decode(&wrap(json)), Err(Error::Schema(SchemaError::NotAnObject(_)))),
        "{json}"
      );
    }
  }

  #[test]
  fn names_first_missing_field() {
    let cases = [
      (r#"{"type":"identity_v1"}"#, "subjectId"),
      (r#"{"subjectId":"1","legalName":"","username":"","type":"identity_v1"}"#, "legalName"),
      (r#"{"subjectId":"1","legalName":"A","type":"identity_v1"}"#, "username"),
      (r#"{"subjectId":null,"legalName":"A","username":"a","type":"identity_v1"}"#, "subjectId"),
    ];
    for (json, field) in cases {
      match decode(&wrap(json)) {
        Err(Error::Schema(SchemaError::MissingField(f))) => assert_eq!(f, field, "{json}"),
        other => panic!("{json}: unexpected {other:?}"),
      }
    }
  }

  #[test]
  fn missing_field_is_reported_before_type_tag() {
    let token = wrap(r#"{"legalName":"A","username":"a","type":"user_identity"}"#);
    assert!(matches!(
      decode(&token),
      Err(Error::Schema(SchemaError::MissingField("subjectId")))
    ));
  }

  #[test]
  fn rejects_wrong_type_tag() {
    let token = wrap(r#"{"subjectId":"1","legalName":"A","username":"a","type":"user_identity"}"#);
    assert!(matches!(
      decode(&token),
      Err(Error::Schema(SchemaError::WrongType { found: Some(t) })) if t == "user_identity"
    ));
    let token = wrap(r#"{"subjectId":"1","legalName":"A","username":"a"}"#);
    assert!(matches!(
      decode(&token),
      Err(Error::Schema(SchemaError::WrongType { found: None }))
    ));
  }

  #[test]
  fn rejects_malformed_optional_fields() {
    let token = wrap(
      r#"{"subjectId":"1","legalName":"A","username":"a","type":"identity_v1","role":{"label":"x","level":900}}"#,
    );
    assert!(matches!(
      decode(&token),
      Err(Error::Schema(SchemaError::InvalidField { .. }))
    ));
  }
}
