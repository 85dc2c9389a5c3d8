//! # Idempotency Keys
//!
//! Deterministic keys that make ingestion safe to retry. Webhook providers
//! redeliver, CSV files get re-uploaded, and workflow steps re-run after
//! crashes; every write path derives its key from the payload so a replay
//! lands on the same key and becomes a recorded no-op.
//!
//! Keys are `{workflow}:{tenant_id}:{digest}` where the digest is the SHA-256
//! of the canonical JSON form of the payload. Canonicalization sorts object
//! keys recursively, so two payloads that differ only in key order produce
//! the same key.

use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Render a JSON value in canonical form: object keys sorted recursively,
/// arrays kept in order, no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    let rendered = canonical_json(&map[key]);
                    format!("{}:{rendered}", Value::String(key.clone()))
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", entries.join(","))
        }
        scalar => scalar.to_string(),
    }
}

/// Hex SHA-256 digest of a payload's canonical JSON form
pub fn payload_digest(payload: &Value) -> String {
    let canonical = canonical_json(payload);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the idempotency key for a write scoped to a workflow and tenant
pub fn generate_idempotency_key(workflow: &str, tenant_id: Uuid, payload: &Value) -> String {
    format!("{workflow}:{tenant_id}:{}", payload_digest(payload))
}
