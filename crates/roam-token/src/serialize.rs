//! Canonical JSON serialization.
//!
//! Field order is part of the wire contract: peers hash these bytes, so the
//! emitted sequence must be byte-stable across implementations. Absent
//! optional fields are omitted entirely, never emitted as `null`.

use serde_json::{Map, Value};

use crate::token::{Token, normalized_timestamp};

/// Post-processing hook: may add vendor fields to the finished document.
pub type SerializeHook<'a> = &'a dyn Fn(&Token, &mut Map<String, Value>);

pub(crate) fn to_json(
  token: &Token,
  include_owner: bool,
  hook: Option<SerializeHook<'_>>,
) -> Value {
  let mut doc = Map::new();

  if include_owner {
    doc.insert(
      "country_code".to_string(),
      Value::String(token.country_code().to_string()),
    );
    doc.insert(
      "party_id".to_string(),
      Value::String(token.party_id().to_string()),
    );
  }
  doc.insert("uid".to_string(), Value::String(token.uid().to_string()));
  doc.insert(
    "type".to_string(),
    Value::String(token.token_type().to_string()),
  );
  doc.insert(
    "auth_id".to_string(),
    Value::String(token.auth_id().to_string()),
  );
  if let Some(vn) = token.visual_number() {
    doc.insert("visual_number".to_string(), Value::String(vn.to_string()));
  }
  doc.insert(
    "issuer".to_string(),
    Value::String(token.issuer().to_string()),
  );
  doc.insert("valid".to_string(), Value::Bool(token.valid()));
  doc.insert(
    "whitelist".to_string(),
    Value::String(token.whitelist().to_string()),
  );
  if let Some(lang) = token.language() {
    doc.insert("language".to_string(), Value::String(lang.to_string()));
  }
  // `created` is a server-local extension field and is intentionally never
  // emitted.
  doc.insert(
    "last_updated".to_string(),
    Value::String(normalized_timestamp(token.last_updated())),
  );

  if let Some(hook) = hook {
    hook(token, &mut doc);
  }

  Value::Object(doc)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
