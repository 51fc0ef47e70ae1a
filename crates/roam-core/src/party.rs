//! Owner identity value types.
//!
//! A token is owned by the party that issued it, addressed by an ISO-3166
//! alpha-2 country code plus a short party id. Both are stored uppercase so
//! that comparison and hashing are case-insensitive by construction.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── CountryCode ─────────────────────────────────────────────────────────────

/// ISO-3166 alpha-2 country code, e.g. `DE`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
  pub fn new(s: impl AsRef<str>) -> Result<Self> {
    let s = s.as_ref();
    if s.len() != 2 || !s.chars().all(|c| c.is_ascii_alphabetic()) {
      return Err(Error::malformed(
        "country_code",
        format!("expected 2 ASCII letters, got {s:?}"),
      ));
    }
    Ok(Self(s.to_ascii_uppercase()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CountryCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for CountryCode {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl TryFrom<String> for CountryCode {
  type Error = Error;
  fn try_from(s: String) -> Result<Self> { Self::new(&s) }
}

impl From<CountryCode> for String {
  fn from(cc: CountryCode) -> String { cc.0 }
}

// ─── PartyId ─────────────────────────────────────────────────────────────────

/// Short party code, 1–3 ASCII alphanumerics, e.g. `ABC`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct PartyId(String);

impl PartyId {
  pub fn new(s: impl AsRef<str>) -> Result<Self> {
    let s = s.as_ref();
    if s.is_empty()
      || s.len() > 3
      || !s.chars().all(|c| c.is_ascii_alphanumeric())
    {
      return Err(Error::malformed(
        "party_id",
        format!("expected 1–3 ASCII alphanumerics, got {s:?}"),
      ));
    }
    Ok(Self(s.to_ascii_uppercase()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PartyId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for PartyId {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl TryFrom<String> for PartyId {
  type Error = Error;
  fn try_from(s: String) -> Result<Self> { Self::new(&s) }
}

impl From<PartyId> for String {
  fn from(p: PartyId) -> String { p.0 }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn country_code_uppercases() {
    assert_eq!(CountryCode::new("de").unwrap().as_str(), "DE");
    assert_eq!(
      CountryCode::new("de").unwrap(),
      CountryCode::new("DE").unwrap()
    );
  }

  #[test]
  fn country_code_rejects_bad_input() {
    assert!(CountryCode::new("").is_err());
    assert!(CountryCode::new("DEU").is_err());
    assert!(CountryCode::new("D1").is_err());
  }

  #[test]
  fn party_id_bounds() {
    assert_eq!(PartyId::new("abc").unwrap().as_str(), "ABC");
    assert!(PartyId::new("A").is_ok());
    assert!(PartyId::new("").is_err());
    assert!(PartyId::new("ABCD").is_err());
    assert!(PartyId::new("A-C").is_err());
  }

  #[test]
  fn serde_round_trip() {
    let cc: CountryCode = serde_json::from_str("\"nl\"").unwrap();
    assert_eq!(cc.as_str(), "NL");
    assert_eq!(serde_json::to_string(&cc).unwrap(), "\"NL\"");
    assert!(serde_json::from_str::<CountryCode>("\"NLD\"").is_err());
  }
}
