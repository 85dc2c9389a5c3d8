//! API webhook channel.
//!
//! Carrier webhooks post structured JSON. Field spellings vary between
//! integrations (snake_case, camelCase, `awb`), so lookups try the known
//! aliases in order. A body missing its tracking number or status is
//! malformed and normalizes to zero events.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::types::NormalizedEvent;
use crate::models::IngestionMode;

const TRACKING_FIELDS: [&str; 3] = ["tracking_number", "trackingNumber", "awb"];
const STATUS_FIELDS: [&str; 3] = ["status", "provider_status", "providerStatus"];
const PROVIDER_FIELDS: [&str; 2] = ["provider", "carrier"];
const LOCATION_FIELDS: [&str; 1] = ["location"];
const DESCRIPTION_FIELDS: [&str; 2] = ["description", "note"];
const OCCURRED_AT_FIELDS: [&str; 3] = ["occurred_at", "occurredAt", "timestamp"];

fn first_string(body: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn occurred_at(body: &Value) -> DateTime<Utc> {
    first_string(body, &OCCURRED_AT_FIELDS)
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Normalize one webhook body into at most one event
pub fn normalize_api_payload(raw_body: &Value) -> Vec<NormalizedEvent> {
    if !raw_body.is_object() {
        debug!("api payload is not a JSON object, dropping");
        return Vec::new();
    }

    let Some(tracking_number) = first_string(raw_body, &TRACKING_FIELDS) else {
        debug!("api payload has no tracking number, dropping");
        return Vec::new();
    };
    let Some(provider_status) = first_string(raw_body, &STATUS_FIELDS) else {
        debug!(tracking_number = %tracking_number, "api payload has no status, dropping");
        return Vec::new();
    };

    vec![NormalizedEvent {
        tracking_number: Some(tracking_number),
        provider: first_string(raw_body, &PROVIDER_FIELDS),
        provider_status: Some(provider_status),
        location: first_string(raw_body, &LOCATION_FIELDS),
        description: first_string(raw_body, &DESCRIPTION_FIELDS),
        occurred_at: occurred_at(raw_body),
        mode: IngestionMode::Api,
        is_primary: true,
    }]
}
