//! Error types shared by the roam crates.
//!
//! One taxonomy covers both parsing and patching: a patched document is
//! re-validated through the same parser, so both paths report failures in
//! identical terms.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The inbound document (or merge patch) was empty.
  #[error("empty JSON document")]
  EmptyDocument,

  /// An identity field was supplied neither out-of-band nor in the body.
  #[error("missing identity field: {0}")]
  MissingIdentity(&'static str),

  /// The caller-supplied identity hint disagrees with the document body.
  #[error("identity mismatch for {field}: caller supplied {hint:?}, body carries {body:?}")]
  IdentityMismatch {
    field: &'static str,
    hint:  String,
    body:  String,
  },

  #[error("missing mandatory field: {0}")]
  MissingField(&'static str),

  #[error("malformed field {field}: {reason}")]
  MalformedField { field: String, reason: String },

  /// A merge patch tried to touch an immutable field, at any nesting depth.
  #[error("field {0} is immutable and cannot be patched")]
  ImmutableFieldPatch(&'static str),

  /// The patch's `last_updated` is not strictly newer than the entity's.
  #[error("patch timestamp {patched} is not newer than current {current}")]
  StaleTimestamp { patched: String, current: String },

  /// The merged document failed re-validation.
  #[error("patched document failed re-validation: {0}")]
  InvalidPatchResult(#[source] Box<Error>),
}

impl Error {
  /// Shorthand for a [`Error::MalformedField`] carrying the underlying
  /// cause's text.
  pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::MalformedField {
      field:  field.into(),
      reason: reason.into(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
