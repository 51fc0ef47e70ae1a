//! Merge-patch engine.
//!
//! RFC-7396-style recursive merge with two protocol guards: the immutable
//! `uid` may never be touched, and a caller-supplied `last_updated` must be
//! strictly newer than the entity's unless downgrades are explicitly
//! allowed. The merge always runs against a disposable working copy, and the
//! result is re-validated through the same parser as inbound documents — a
//! patched token can never violate an invariant a freshly parsed one must
//! satisfy.

use chrono::Utc;
use roam_core::{Error, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
  parse::{self, IdentityHints},
  token::{Token, normalized_timestamp},
};

/// The one key a patch may never touch, at any nesting depth.
const IMMUTABLE_KEY: &str = "uid";

/// Recursively merge `patch` into `target`.
///
/// RFC 7396 semantics: `null` deletes the key, object-onto-object merges
/// key-wise, object-onto-anything-else replaces wholesale (building up from
/// an empty object, which drops the patch's `null` markers), and scalars or
/// arrays replace directly. Any `uid` key in the patch fails the whole
/// operation.
pub fn json_merge(target: &mut Value, patch: &Value) -> Result<()> {
  match patch {
    Value::Object(patch_obj) => {
      if !target.is_object() {
        *target = Value::Object(Map::new());
      }
      if let Value::Object(target_obj) = target {
        merge_objects(target_obj, patch_obj)?;
      }
      Ok(())
    }
    _ => {
      *target = patch.clone();
      Ok(())
    }
  }
}

fn merge_objects(
  target: &mut Map<String, Value>,
  patch: &Map<String, Value>,
) -> Result<()> {
  for (key, patch_value) in patch {
    if key == IMMUTABLE_KEY {
      return Err(Error::ImmutableFieldPatch(IMMUTABLE_KEY));
    }
    match patch_value {
      Value::Null => {
        target.shift_remove(key);
      }
      Value::Object(_) => {
        let slot = target
          .entry(key.clone())
          .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
          *slot = Value::Object(Map::new());
        }
        json_merge(slot, patch_value)?;
      }
      _ => {
        target.insert(key.clone(), patch_value.clone());
      }
    }
  }
  Ok(())
}

impl Token {
  /// Apply a merge patch, producing a new token with its own freshly
  /// computed ETag. This instance is never mutated; on failure it is
  /// completely unaffected.
  ///
  /// A patch without `last_updated` gets the current time injected and is
  /// exempt from the staleness check; a caller-supplied `last_updated` must
  /// be strictly newer (in normalized text form) than the current value
  /// unless `allow_downgrade` is set.
  pub fn with_patch(
    &self,
    patch: &Value,
    allow_downgrade: bool,
  ) -> Result<Token> {
    let patch_obj = match patch {
      Value::Object(obj) if !obj.is_empty() => obj,
      Value::Object(_) | Value::Null => return Err(Error::EmptyDocument),
      _ => return Err(Error::malformed("patch", "expected a JSON object")),
    };

    // At most one merge per instance at a time: two concurrent patches would
    // otherwise both read this snapshot and one update would be lost. The
    // guarded region never leaves shared state behind, so a poisoned lock
    // carries no hazard.
    let _guard = self.patch_guard().lock().unwrap_or_else(|e| e.into_inner());

    let mut patch_obj = patch_obj.clone();
    match patch_obj.get("last_updated") {
      None => {
        patch_obj.insert(
          "last_updated".to_string(),
          Value::String(normalized_timestamp(Utc::now())),
        );
      }
      Some(v) if !allow_downgrade => {
        let patched =
          normalized_timestamp(parse::parse_timestamp("last_updated", v)?);
        let current = normalized_timestamp(self.last_updated());
        if patched <= current {
          warn!(
            uid = %self.uid(),
            %patched,
            %current,
            "rejecting stale merge patch"
          );
          return Err(Error::StaleTimestamp { patched, current });
        }
      }
      Some(_) => {}
    }

    let mut doc = self.to_json(true);
    if let Value::Object(obj) = &mut doc {
      // Carry the inbound-only extension field so an untouched `created`
      // survives re-parsing; the patch may still override it.
      obj.insert(
        "created".to_string(),
        Value::String(normalized_timestamp(self.created())),
      );
    }
    json_merge(&mut doc, &Value::Object(patch_obj))?;

    debug!(uid = %self.uid(), "re-validating merged document");
    parse::parse(&doc, &IdentityHints::of(self), None).map_err(|e| match e {
      e @ Error::ImmutableFieldPatch(_) => e,
      other => Error::InvalidPatchResult(Box::new(other)),
    })
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use serde_json::json;

  use super::*;
  use crate::test_helpers::make_token;

  // ── Bare merge semantics ─────────────────────────────────────────────────

  #[test]
  fn null_deletes_a_key() {
    let mut target = json!({ "a": 1, "b": 2 });
    json_merge(&mut target, &json!({ "b": null })).unwrap();
    assert_eq!(target, json!({ "a": 1 }));
  }

  #[test]
  fn nested_objects_merge_key_wise() {
    let mut target = json!({ "outer": { "keep": 1, "change": 2 } });
    json_merge(&mut target, &json!({ "outer": { "change": 3, "add": 4 } }))
      .unwrap();
    assert_eq!(
      target,
      json!({ "outer": { "keep": 1, "change": 3, "add": 4 } })
    );
  }

  #[test]
  fn object_onto_non_object_replaces_wholesale() {
    let mut target = json!({ "slot": "scalar" });
    json_merge(&mut target, &json!({ "slot": { "a": 1, "b": null } }))
      .unwrap();
    // The null marker is a delete instruction, not a value.
    assert_eq!(target, json!({ "slot": { "a": 1 } }));
  }

  #[test]
  fn scalars_and_arrays_replace_directly() {
    let mut target = json!({ "n": { "deep": true }, "list": [1, 2] });
    json_merge(&mut target, &json!({ "n": 7, "list": [3] })).unwrap();
    assert_eq!(target, json!({ "n": 7, "list": [3] }));
  }

  #[test]
  fn uid_key_is_rejected_at_any_depth() {
    let mut target = json!({ "uid": "TOK123", "nested": {} });
    assert!(matches!(
      json_merge(&mut target, &json!({ "uid": "TOK999" })),
      Err(Error::ImmutableFieldPatch("uid"))
    ));
    assert!(matches!(
      json_merge(&mut target, &json!({ "nested": { "uid": "TOK999" } })),
      Err(Error::ImmutableFieldPatch("uid"))
    ));
  }

  // ── Token::with_patch ────────────────────────────────────────────────────

  #[test]
  fn concrete_scenario_valid_flip() {
    let original = make_token();
    let before = Utc::now();

    let patched =
      original.with_patch(&json!({ "valid": false }), false).unwrap();

    assert!(!patched.valid());
    assert_eq!(patched.uid(), original.uid());
    assert_eq!(patched.auth_id(), original.auth_id());
    assert_eq!(patched.issuer(), original.issuer());
    assert_eq!(patched.whitelist(), original.whitelist());
    assert!(patched.last_updated() >= before);
    // The original instance is untouched.
    assert!(original.valid());
    assert_eq!(
      original.last_updated(),
      Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    );
    assert_ne!(original.etag(), patched.etag());
  }

  #[test]
  fn empty_patch_is_rejected() {
    let token = make_token();
    assert!(matches!(
      token.with_patch(&json!({}), false),
      Err(Error::EmptyDocument)
    ));
    assert!(matches!(
      token.with_patch(&Value::Null, false),
      Err(Error::EmptyDocument)
    ));
  }

  #[test]
  fn patching_uid_fails_even_with_the_same_value() {
    let token = make_token();
    assert!(matches!(
      token.with_patch(&json!({ "uid": "TOK123" }), false),
      Err(Error::ImmutableFieldPatch("uid"))
    ));
  }

  #[test]
  fn stale_timestamp_is_rejected() {
    let token = make_token(); // last_updated = 2024-01-01T00:00:00Z
    let patch = json!({
      "valid": false,
      "last_updated": "2023-12-31T23:59:59Z"
    });
    assert!(matches!(
      token.with_patch(&patch, false),
      Err(Error::StaleTimestamp { .. })
    ));

    // Equal (not strictly greater) is also stale.
    let patch = json!({
      "valid": false,
      "last_updated": "2024-01-01T00:00:00Z"
    });
    assert!(matches!(
      token.with_patch(&patch, false),
      Err(Error::StaleTimestamp { .. })
    ));
  }

  #[test]
  fn downgrade_is_allowed_when_requested() {
    let token = make_token();
    let patch = json!({
      "valid": false,
      "last_updated": "2023-12-31T23:59:59Z"
    });
    let patched = token.with_patch(&patch, true).unwrap();
    assert_eq!(
      patched.last_updated(),
      Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()
    );
  }

  #[test]
  fn missing_last_updated_is_injected() {
    let token = make_token();
    let before = Utc::now();
    let patched = token
      .with_patch(&json!({ "issuer": "New Issuer" }), false)
      .unwrap();
    assert_eq!(patched.issuer(), "New Issuer");
    assert!(normalized_timestamp(patched.last_updated()) >= normalized_timestamp(before));
  }

  #[test]
  fn null_removes_an_optional_field() {
    let token = make_token();
    let patched = token
      .with_patch(&json!({ "visual_number": "0123 4567" }), false)
      .unwrap();
    assert_eq!(patched.visual_number(), Some("0123 4567"));

    let cleared = patched
      .with_patch(&json!({ "visual_number": null }), false)
      .unwrap();
    assert_eq!(cleared.visual_number(), None);
  }

  #[test]
  fn created_survives_a_patch() {
    let token = make_token();
    let patched =
      token.with_patch(&json!({ "valid": false }), false).unwrap();
    assert_eq!(patched.created(), token.created());
  }

  #[test]
  fn invalid_merge_result_is_reported() {
    let token = make_token();
    // Deleting a mandatory field makes the merged document unparseable.
    let err =
      token.with_patch(&json!({ "issuer": null }), false).unwrap_err();
    assert!(
      matches!(err, Error::InvalidPatchResult(_)),
      "got {err:?}"
    );
  }

  #[test]
  fn owner_identity_cannot_drift_through_a_patch() {
    let token = make_token();
    let err = token
      .with_patch(&json!({ "country_code": "FR" }), false)
      .unwrap_err();
    // Re-validation runs with the original identity as hints.
    assert!(matches!(err, Error::InvalidPatchResult(_)), "got {err:?}");
  }

  #[test]
  fn concurrent_patches_serialize_per_instance() {
    let token = std::sync::Arc::new(make_token());
    let handles: Vec<_> = (0..4)
      .map(|i| {
        let token = std::sync::Arc::clone(&token);
        std::thread::spawn(move || {
          token.with_patch(&json!({ "issuer": format!("Issuer {i}") }), false)
        })
      })
      .collect();
    for handle in handles {
      let patched = handle.join().unwrap().unwrap();
      // Every patch observed the same snapshot; the original is unchanged.
      assert!(patched.issuer().starts_with("Issuer "));
    }
    assert_eq!(token.issuer(), "ACME");
  }
}
