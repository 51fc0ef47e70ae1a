//! Inbound document parser/validator.
//!
//! Pipeline, first failure wins:
//!   non-empty object check
//!     └─ identity cross-check (hints vs body)
//!          └─ mandatory fields
//!               └─ optional fields
//!                    └─ Token::new (re-validation + ETag finalization)
//!                         └─ custom-field extension hook

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use roam_core::{
  AuthId, CountryCode, Error, Language, PartyId, Result, TokenType, TokenUid,
  WhitelistType,
};
use serde_json::{Map, Value};

use crate::token::{NewToken, Token};

// ─── Identity hints ──────────────────────────────────────────────────────────

/// Identity fields known from outside the document body, e.g. from request
/// path segments. Each must agree with the body when both are present; the
/// hint wins when they agree, and identity missing from both sides is an
/// error.
#[derive(Debug, Clone, Default)]
pub struct IdentityHints {
  pub country_code: Option<CountryCode>,
  pub party_id:     Option<PartyId>,
  pub uid:          Option<TokenUid>,
}

impl IdentityHints {
  /// The full identity of an existing token, for re-validating documents
  /// derived from it.
  pub fn of(token: &Token) -> Self {
    Self {
      country_code: Some(token.country_code().clone()),
      party_id:     Some(token.party_id().clone()),
      uid:          Some(token.uid().clone()),
    }
  }
}

/// Custom-field extension hook: sees the raw document and the constructed
/// token, and may return a replacement. Vendor extensions ride through here
/// without the core caring about them.
pub type ParseHook<'a> = &'a dyn Fn(&Map<String, Value>, Token) -> Result<Token>;

// ─── Parser ──────────────────────────────────────────────────────────────────

pub(crate) fn parse(
  doc: &Value,
  hints: &IdentityHints,
  hook: Option<ParseHook<'_>>,
) -> Result<Token> {
  let obj = match doc {
    Value::Object(obj) if !obj.is_empty() => obj,
    Value::Object(_) | Value::Null => return Err(Error::EmptyDocument),
    _ => return Err(Error::malformed("document", "expected a JSON object")),
  };

  let country_code = resolve_identity(
    "country_code",
    hints.country_code.as_ref(),
    obj.get("country_code"),
  )?;
  let party_id =
    resolve_identity("party_id", hints.party_id.as_ref(), obj.get("party_id"))?;
  let uid = resolve_identity("uid", hints.uid.as_ref(), obj.get("uid"))?;

  let token_type: TokenType = decode("type", required(obj, "type")?)?;
  let auth_id: AuthId = decode("auth_id", required(obj, "auth_id")?)?;
  let issuer: String = decode("issuer", required(obj, "issuer")?)?;
  let valid: bool = decode("valid", required(obj, "valid")?)?;
  let whitelist: WhitelistType =
    decode("whitelist", required(obj, "whitelist")?)?;

  let visual_number: Option<String> = match present(obj, "visual_number") {
    Some(v) => Some(decode("visual_number", v)?),
    None => None,
  };
  let language: Option<Language> = match present(obj, "language") {
    Some(v) => Some(decode("language", v)?),
    None => None,
  };

  // `created` is an inbound-only extension field; absent means "let the
  // constructor default it".
  let created = match present(obj, "created") {
    Some(v) => Some(parse_timestamp("created", v)?),
    None => None,
  };
  // Mandatory inbound, unlike direct construction.
  let last_updated =
    parse_timestamp("last_updated", required(obj, "last_updated")?)?;

  let token = Token::new(NewToken {
    country_code,
    party_id,
    uid,
    token_type,
    auth_id,
    visual_number,
    issuer,
    valid,
    whitelist,
    language,
    created,
    last_updated: Some(last_updated),
  })?;

  match hook {
    Some(hook) => hook(obj, token),
    None => Ok(token),
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Resolve one identity field from an out-of-band hint and/or the body.
fn resolve_identity<T>(
  field: &'static str,
  hint: Option<&T>,
  body: Option<&Value>,
) -> Result<T>
where
  T: Clone + PartialEq + fmt::Display + serde::de::DeserializeOwned,
{
  let body = match body.filter(|v| !v.is_null()) {
    Some(v) => Some(decode::<T>(field, v)?),
    None => None,
  };
  match (hint, body) {
    (None, None) => Err(Error::MissingIdentity(field)),
    (Some(h), None) => Ok(h.clone()),
    (None, Some(b)) => Ok(b),
    (Some(h), Some(b)) if *h == b => Ok(h.clone()),
    (Some(h), Some(b)) => Err(Error::IdentityMismatch {
      field,
      hint: h.to_string(),
      body: b.to_string(),
    }),
  }
}

fn required<'a>(
  obj: &'a Map<String, Value>,
  field: &'static str,
) -> Result<&'a Value> {
  // A JSON `null` carries no value; treat it the same as an absent key.
  present(obj, field).ok_or(Error::MissingField(field))
}

fn present<'a>(
  obj: &'a Map<String, Value>,
  field: &str,
) -> Option<&'a Value> {
  obj.get(field).filter(|v| !v.is_null())
}

/// Deserialize a field value, converting any lower-level failure into a
/// `MalformedField` carrying the cause's message.
fn decode<T: serde::de::DeserializeOwned>(
  field: &'static str,
  v: &Value,
) -> Result<T> {
  serde_json::from_value(v.clone())
    .map_err(|e| Error::malformed(field, e.to_string()))
}

/// Accept RFC 3339 with offset, or a naive `YYYY-MM-DDTHH:MM:SS[.frac]`
/// assumed UTC.
pub(crate) fn parse_timestamp(
  field: &'static str,
  v: &Value,
) -> Result<DateTime<Utc>> {
  let s = v
    .as_str()
    .ok_or_else(|| Error::malformed(field, "expected an ISO-8601 string"))?;
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
    return Ok(naive.and_utc());
  }
  Err(Error::malformed(field, format!("unrecognized timestamp {s:?}")))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
