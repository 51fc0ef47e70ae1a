//! The token entity.
//!
//! A [`Token`] is immutable once constructed: its ETag and comparison hash
//! code are finalized in [`Token::new`] before the value is handed to any
//! caller, and the only mutation path — the merge-patch engine — rebuilds a
//! fresh instance instead of touching this one.

use std::{
  cmp::Ordering,
  hash::{DefaultHasher, Hash, Hasher},
  sync::{Arc, Mutex},
};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, SecondsFormat, Utc};
use roam_core::{
  AuthId, CountryCode, Error, Language, PartyId, Result, TokenType, TokenUid,
  WhitelistType,
};
use sha2::{Digest, Sha256};

use crate::serialize;

/// Longest permitted `issuer` / `visual_number` value.
pub const MAX_DISPLAY_LEN: usize = 64;

/// Normalized timestamp text: UTC, whole-second RFC 3339 (`…T…Z`).
///
/// Fixed width, so lexicographic order is chronological order. Equality,
/// ordering, hashing, serialization, and the patch staleness check all go
/// through this form; instants that differ only below the second compare
/// equal.
pub fn normalized_timestamp(ts: DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ─── NewToken ────────────────────────────────────────────────────────────────

/// Input to [`Token::new`].
/// The derived fields (ETag, hash code) are always computed by the
/// constructor; they are not accepted from callers.
#[derive(Debug, Clone)]
pub struct NewToken {
  pub country_code:  CountryCode,
  pub party_id:      PartyId,
  pub uid:           TokenUid,
  pub token_type:    TokenType,
  pub auth_id:       AuthId,
  pub visual_number: Option<String>,
  pub issuer:        String,
  pub valid:         bool,
  pub whitelist:     WhitelistType,
  pub language:      Option<Language>,
  /// Defaults to `last_updated`, or to now when both are absent.
  pub created:       Option<DateTime<Utc>>,
  /// Defaults symmetrically with `created`.
  pub last_updated:  Option<DateTime<Utc>>,
}

// ─── Token ───────────────────────────────────────────────────────────────────

/// One addressable, owned, versioned token record.
///
/// Fields are private: every instance has passed validation and carries a
/// content hash taken over its canonical serialization at construction time.
#[derive(Debug, Clone)]
pub struct Token {
  country_code:  CountryCode,
  party_id:      PartyId,
  uid:           TokenUid,
  token_type:    TokenType,
  auth_id:       AuthId,
  visual_number: Option<String>,
  issuer:        String,
  valid:         bool,
  whitelist:     WhitelistType,
  language:      Option<Language>,
  created:       DateTime<Utc>,
  last_updated:  DateTime<Utc>,
  /// base64(SHA-256) of the canonical serialization without owner fields.
  etag:          String,
  /// Comparison summary over the business fields; never the ETag.
  hash_code:     u64,
  /// Serializes merge patches against this instance. Clones share the guard:
  /// a clone is the same logical snapshot.
  patch_guard:   Arc<Mutex<()>>,
}

impl Token {
  /// Construct and finalize a token.
  ///
  /// Validates the display fields, defaults the timestamps (one supplied →
  /// copied to the other; neither → both now), then computes the ETag and
  /// the comparison hash code. Both derived values are immutable afterwards.
  pub fn new(fields: NewToken) -> Result<Self> {
    if fields.issuer.is_empty() {
      return Err(Error::malformed("issuer", "must not be empty"));
    }
    if fields.issuer.chars().count() > MAX_DISPLAY_LEN {
      return Err(Error::malformed(
        "issuer",
        format!("longer than {MAX_DISPLAY_LEN} characters"),
      ));
    }
    // An empty visual number carries no information; normalize to absent so
    // serialization and comparison treat both spellings identically.
    let visual_number = fields.visual_number.filter(|vn| !vn.is_empty());
    if let Some(vn) = &visual_number
      && vn.chars().count() > MAX_DISPLAY_LEN
    {
      return Err(Error::malformed(
        "visual_number",
        format!("longer than {MAX_DISPLAY_LEN} characters"),
      ));
    }

    let (created, last_updated) = match (fields.created, fields.last_updated)
    {
      (Some(c), Some(l)) => (c, l),
      (Some(c), None) => (c, c),
      (None, Some(l)) => (l, l),
      (None, None) => {
        let now = Utc::now();
        (now, now)
      }
    };

    let mut token = Self {
      country_code: fields.country_code,
      party_id: fields.party_id,
      uid: fields.uid,
      token_type: fields.token_type,
      auth_id: fields.auth_id,
      visual_number,
      issuer: fields.issuer,
      valid: fields.valid,
      whitelist: fields.whitelist,
      language: fields.language,
      created,
      last_updated,
      etag: String::new(),
      hash_code: 0,
      patch_guard: Arc::new(Mutex::new(())),
    };
    token.etag = token.compute_etag();
    token.hash_code = token.compute_hash_code();
    Ok(token)
  }

  // ── Accessors ────────────────────────────────────────────────────────────

  pub fn country_code(&self) -> &CountryCode { &self.country_code }

  pub fn party_id(&self) -> &PartyId { &self.party_id }

  pub fn uid(&self) -> &TokenUid { &self.uid }

  pub fn token_type(&self) -> TokenType { self.token_type }

  pub fn auth_id(&self) -> &AuthId { &self.auth_id }

  pub fn visual_number(&self) -> Option<&str> {
    self.visual_number.as_deref()
  }

  pub fn issuer(&self) -> &str { &self.issuer }

  pub fn valid(&self) -> bool { self.valid }

  pub fn whitelist(&self) -> WhitelistType { self.whitelist }

  pub fn language(&self) -> Option<Language> { self.language }

  pub fn created(&self) -> DateTime<Utc> { self.created }

  pub fn last_updated(&self) -> DateTime<Utc> { self.last_updated }

  /// Cache-validation token: base64(SHA-256) of the canonical serialization
  /// without owner fields, taken at construction.
  pub fn etag(&self) -> &str { &self.etag }

  pub(crate) fn patch_guard(&self) -> &Mutex<()> { &self.patch_guard }

  // ── Serialization ────────────────────────────────────────────────────────

  /// Canonical JSON form. Owner fields (`country_code`, `party_id`) are
  /// included only when `include_owner` is set; `created` is never emitted.
  pub fn to_json(&self, include_owner: bool) -> serde_json::Value {
    serialize::to_json(self, include_owner, None)
  }

  /// Like [`Token::to_json`], with a post-processing hook that may add
  /// vendor fields to the finished document.
  pub fn to_json_with(
    &self,
    include_owner: bool,
    hook: serialize::SerializeHook<'_>,
  ) -> serde_json::Value {
    serialize::to_json(self, include_owner, Some(hook))
  }

  // ── Derived fields ───────────────────────────────────────────────────────

  fn compute_etag(&self) -> String {
    // `Value::to_string` is the compact writer; with insertion-ordered maps
    // the byte sequence is canonical.
    let canonical = self.to_json(false).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    BASE64.encode(digest)
  }

  fn compute_hash_code(&self) -> u64 {
    let mut h = DefaultHasher::new();
    self.country_code.hash(&mut h);
    self.party_id.hash(&mut h);
    self.uid.hash(&mut h);
    self.token_type.hash(&mut h);
    self.auth_id.hash(&mut h);
    self.issuer.hash(&mut h);
    self.valid.hash(&mut h);
    self.whitelist.hash(&mut h);
    normalized_timestamp(self.created).hash(&mut h);
    normalized_timestamp(self.last_updated).hash(&mut h);
    self.visual_number.hash(&mut h);
    self.language.hash(&mut h);
    h.finish()
  }
}

// ─── Equality / ordering ─────────────────────────────────────────────────────

// Business-field comparison only: the ETag, hash code, and patch guard never
// participate. Timestamps compare in normalized text form so instants that
// differ only below the second are equal.
impl Ord for Token {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .country_code
      .cmp(&other.country_code)
      .then_with(|| self.party_id.cmp(&other.party_id))
      .then_with(|| self.uid.cmp(&other.uid))
      .then_with(|| self.token_type.cmp(&other.token_type))
      .then_with(|| self.auth_id.cmp(&other.auth_id))
      .then_with(|| self.issuer.cmp(&other.issuer))
      .then_with(|| self.valid.cmp(&other.valid))
      .then_with(|| self.whitelist.cmp(&other.whitelist))
      .then_with(|| {
        normalized_timestamp(self.created)
          .cmp(&normalized_timestamp(other.created))
      })
      .then_with(|| {
        normalized_timestamp(self.last_updated)
          .cmp(&normalized_timestamp(other.last_updated))
      })
      // Tie-breakers so that `Ord` and `Eq` agree on one field set.
      .then_with(|| self.visual_number.cmp(&other.visual_number))
      .then_with(|| self.language.cmp(&other.language))
  }
}

impl PartialOrd for Token {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Token {
  fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Token {}

impl Hash for Token {
  fn hash<H: Hasher>(&self, state: &mut H) {
    state.write_u64(self.hash_code);
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::test_helpers::{make_token, new_token_fields};

  #[test]
  fn timestamps_default_to_now_when_both_absent() {
    let before = Utc::now();
    let mut fields = new_token_fields();
    fields.created = None;
    fields.last_updated = None;
    let token = Token::new(fields).unwrap();
    assert!(token.created() >= before);
    assert_eq!(token.created(), token.last_updated());
  }

  #[test]
  fn single_timestamp_is_copied_to_the_other() {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let mut fields = new_token_fields();
    fields.created = Some(ts);
    fields.last_updated = None;
    let token = Token::new(fields).unwrap();
    assert_eq!(token.last_updated(), ts);

    let mut fields = new_token_fields();
    fields.created = None;
    fields.last_updated = Some(ts);
    let token = Token::new(fields).unwrap();
    assert_eq!(token.created(), ts);
  }

  #[test]
  fn issuer_must_be_short_and_non_empty() {
    let mut fields = new_token_fields();
    fields.issuer = String::new();
    assert!(Token::new(fields).is_err());

    let mut fields = new_token_fields();
    fields.issuer = "x".repeat(MAX_DISPLAY_LEN + 1);
    assert!(Token::new(fields).is_err());
  }

  #[test]
  fn empty_visual_number_is_normalized_to_absent() {
    let mut fields = new_token_fields();
    fields.visual_number = Some(String::new());
    let token = Token::new(fields).unwrap();
    assert_eq!(token.visual_number(), None);
  }

  #[test]
  fn etag_is_stable_for_identical_fields() {
    let a = make_token();
    let b = make_token();
    assert_eq!(a.etag(), b.etag());
  }

  #[test]
  fn etag_changes_with_any_non_owner_field() {
    let a = make_token();
    let mut fields = new_token_fields();
    fields.valid = !fields.valid;
    let b = Token::new(fields).unwrap();
    assert_ne!(a.etag(), b.etag());
  }

  #[test]
  fn etag_ignores_owner_fields() {
    let a = make_token();
    let mut fields = new_token_fields();
    fields.country_code = CountryCode::new("FR").unwrap();
    fields.party_id = PartyId::new("XYZ").unwrap();
    let b = Token::new(fields).unwrap();
    assert_eq!(a.etag(), b.etag());
  }

  #[test]
  fn equality_is_insensitive_to_subsecond_precision() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut fields = new_token_fields();
    fields.created = Some(base);
    fields.last_updated = Some(base);
    let a = Token::new(fields.clone()).unwrap();
    fields.last_updated =
      Some(base + chrono::Duration::milliseconds(421));
    let b = Token::new(fields).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn equality_never_compares_the_etag() {
    let a = make_token();
    let mut fields = new_token_fields();
    fields.country_code = CountryCode::new("FR").unwrap();
    let b = Token::new(fields).unwrap();
    // Owner fields are excluded from the content hash, so the ETags agree…
    assert_eq!(a.etag(), b.etag());
    // …yet the tokens differ on a business field.
    assert_ne!(a, b);
  }

  #[test]
  fn ordering_is_antisymmetric_and_transitive() {
    let mut fields = new_token_fields();
    let a = Token::new(fields.clone()).unwrap();
    fields.uid = TokenUid::new("TOK124").unwrap();
    let b = Token::new(fields.clone()).unwrap();
    fields.uid = TokenUid::new("TOK125").unwrap();
    let c = Token::new(fields).unwrap();

    assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    assert_eq!(a.cmp(&a), Ordering::Equal);
    assert!(a < b && b < c && a < c);
  }

  #[test]
  fn owner_fields_lead_the_ordering() {
    let a = make_token();
    let mut fields = new_token_fields();
    fields.country_code = CountryCode::new("AT").unwrap();
    fields.uid = TokenUid::new("ZZZ999").unwrap();
    let b = Token::new(fields).unwrap();
    // AT sorts before DE regardless of the uid.
    assert!(b < a);
  }

  #[test]
  fn hash_code_agrees_with_equality() {
    use std::hash::BuildHasher;
    let a = make_token();
    let b = make_token();
    let s = std::hash::RandomState::new();
    assert_eq!(s.hash_one(&a), s.hash_one(&b));
  }
}
