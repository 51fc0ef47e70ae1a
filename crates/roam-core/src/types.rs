//! Token-scoped value types: identifiers and protocol enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// Longest permitted `uid` / `auth_id` value on the wire.
pub const MAX_ID_LEN: usize = 36;

// ─── TokenUid ────────────────────────────────────────────────────────────────

/// Unique token identifier within a (country code, party id) scope.
/// Immutable for the lifetime of the token.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct TokenUid(String);

impl TokenUid {
  pub fn new(s: impl Into<String>) -> Result<Self> {
    let s = s.into();
    validate_id("uid", &s)?;
    Ok(Self(s))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TokenUid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for TokenUid {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl TryFrom<String> for TokenUid {
  type Error = Error;
  fn try_from(s: String) -> Result<Self> { Self::new(s) }
}

impl From<TokenUid> for String {
  fn from(uid: TokenUid) -> String { uid.0 }
}

// ─── AuthId ──────────────────────────────────────────────────────────────────

/// Authorization reference the charge-point operator authorizes against.
/// Several physical tokens may share one `AuthId`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct AuthId(String);

impl AuthId {
  pub fn new(s: impl Into<String>) -> Result<Self> {
    let s = s.into();
    validate_id("auth_id", &s)?;
    Ok(Self(s))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for AuthId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for AuthId {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl TryFrom<String> for AuthId {
  type Error = Error;
  fn try_from(s: String) -> Result<Self> { Self::new(s) }
}

impl From<AuthId> for String {
  fn from(id: AuthId) -> String { id.0 }
}

/// Non-empty, at most [`MAX_ID_LEN`] visible-ASCII characters.
fn validate_id(field: &'static str, s: &str) -> Result<()> {
  if s.is_empty() {
    return Err(Error::malformed(field, "must not be empty"));
  }
  if s.len() > MAX_ID_LEN {
    return Err(Error::malformed(
      field,
      format!("longer than {MAX_ID_LEN} characters"),
    ));
  }
  if !s.chars().all(|c| c.is_ascii_graphic()) {
    return Err(Error::malformed(
      field,
      format!("contains non-printable or non-ASCII characters: {s:?}"),
    ));
  }
  Ok(())
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// The physical or virtual form of a token.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
  /// One-off token generated for a single ad-hoc session.
  AdHocUser,
  /// Token belonging to a registered app user.
  AppUser,
  Other,
  /// Physical RFID card or fob.
  Rfid,
}

/// Under which conditions the token may be authorized offline.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WhitelistType {
  /// Always whitelist; never forward a real-time authorization request.
  Always,
  /// Whitelisting allowed at the operator's discretion.
  Allowed,
  /// Whitelist only when the party's platform is unreachable.
  AllowedOffline,
  /// Never whitelist; every authorization goes to the owning party.
  Never,
}

/// Preferred interface language of the token holder (ISO 639-1).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
  Cs,
  Da,
  De,
  El,
  En,
  Es,
  Fi,
  Fr,
  Hu,
  It,
  Nl,
  No,
  Pl,
  Pt,
  Ro,
  Sk,
  Sv,
  Tr,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
