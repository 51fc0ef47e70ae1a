//! Token entity and JSON codec for the roam protocol.
//!
//! Parses inbound documents into immutable [`Token`] values, serializes them
//! canonically (byte-stable field order, content-hash ETag), and applies
//! RFC-7396-style merge patches that rebuild — never mutate — the entity.
//! Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```
//! use roam_token::{IdentityHints, parse_str};
//!
//! let doc = r#"{
//!   "country_code": "DE", "party_id": "ABC", "uid": "TOK123",
//!   "type": "RFID", "auth_id": "AUTH1", "issuer": "ACME",
//!   "valid": true, "whitelist": "ALWAYS",
//!   "last_updated": "2024-01-01T00:00:00Z"
//! }"#;
//! let token = parse_str(doc, &IdentityHints::default()).unwrap();
//! assert_eq!(token.uid().as_str(), "TOK123");
//! ```

mod parse;
mod patch;
mod serialize;
mod token;

pub use parse::{IdentityHints, ParseHook};
pub use patch::json_merge;
pub use roam_core::{Error, Result};
pub use serialize::SerializeHook;
pub use token::{MAX_DISPLAY_LEN, NewToken, Token, normalized_timestamp};

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse a single token document.
///
/// `hints` carries identity fields known from outside the body (e.g. route
/// segments); each must agree with the body when both are present.
pub fn parse(
  doc: &serde_json::Value,
  hints: &IdentityHints,
) -> Result<Token> {
  parse::parse(doc, hints, None)
}

/// Like [`parse`], with a custom-field extension hook that sees the raw
/// document and may replace the constructed token.
pub fn parse_with(
  doc: &serde_json::Value,
  hints: &IdentityHints,
  hook: ParseHook<'_>,
) -> Result<Token> {
  parse::parse(doc, hints, Some(hook))
}

/// Parse from raw JSON text. Syntax errors are reported as
/// [`Error::MalformedField`] on the document itself; the parser never
/// propagates a lower-level fault past this contract.
pub fn parse_str(s: &str, hints: &IdentityHints) -> Result<Token> {
  let doc: serde_json::Value = serde_json::from_str(s)
    .map_err(|e| Error::malformed("document", e.to_string()))?;
  parse::parse(&doc, hints, None)
}

// ─── Round-trip tests ────────────────────────────────────────────────────────


// ─── Shared test helpers ─────────────────────────────────────────────────────
