//! Shared fixtures for integration tests: engines over in-memory stores and
//! carrier payload builders.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fulfillment_core::config::FulfillmentConfig;
use fulfillment_core::ingestion::IngestResult;
use fulfillment_core::storage::InMemoryStore;
use fulfillment_core::FulfillmentEngine;
use serde_json::{json, Value};
use uuid::Uuid;

/// Fresh engine over an in-memory store with default configuration, plus the
/// store handle and a random tenant
pub fn engine() -> (FulfillmentEngine<InMemoryStore>, Arc<InMemoryStore>, Uuid) {
    engine_with_config(FulfillmentConfig::default())
}

/// Fresh engine wired from an explicit configuration
pub fn engine_with_config(
    config: FulfillmentConfig,
) -> (FulfillmentEngine<InMemoryStore>, Arc<InMemoryStore>, Uuid) {
    let store = Arc::new(InMemoryStore::new());
    let engine = FulfillmentEngine::with_config(Arc::clone(&store), config);
    (engine, store, Uuid::new_v4())
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

/// Carrier webhook body with an explicit event timestamp.
///
/// Timestamps double as idempotency salt here: two bodies for the same
/// tracking number only dedupe when every field matches, so sequences keep
/// each step at its own instant.
pub fn api_body_at(
    tracking: &str,
    provider: &str,
    status: &str,
    occurred_at: DateTime<Utc>,
) -> Value {
    json!({
        "tracking_number": tracking,
        "provider": provider,
        "status": status,
        "location": "Dubai",
        "description": format!("carrier reported {status}"),
        "occurred_at": occurred_at.to_rfc3339(),
    })
}

/// Carrier webhook body stamped with the current time
pub fn api_body(tracking: &str, provider: &str, status: &str) -> Value {
    api_body_at(tracking, provider, status, Utc::now())
}

/// Submit one webhook per step, in order, and collect the results
pub async fn submit_api_sequence(
    engine: &FulfillmentEngine<InMemoryStore>,
    tenant_id: Uuid,
    tracking: &str,
    provider: &str,
    steps: &[(&str, DateTime<Utc>)],
) -> Vec<IngestResult> {
    let mut results = Vec::with_capacity(steps.len());
    for (status, occurred_at) in steps {
        let body = api_body_at(tracking, provider, status, *occurred_at);
        results.push(engine.submit_api_event(tenant_id, &body).await);
    }
    results
}

/// Drive one order through the whole carrier lifecycle to `delivered`.
///
/// Steps are spaced thirty minutes apart from `base`, which keeps the
/// operations dwell at two hours and the pickup lag at half an hour, both
/// comfortably inside the default SLA targets. Returns the result of the
/// final `delivered` webhook.
pub async fn deliver_order(
    engine: &FulfillmentEngine<InMemoryStore>,
    tenant_id: Uuid,
    tracking: &str,
    provider: &str,
    base: DateTime<Utc>,
) -> IngestResult {
    let steps = [
        ("pending", base),
        ("picked_up", base + Duration::minutes(30)),
        ("in_transit", base + Duration::minutes(60)),
        ("out_for_delivery", base + Duration::minutes(90)),
        ("delivered", base + Duration::minutes(120)),
    ];
    submit_api_sequence(engine, tenant_id, tracking, provider, &steps)
        .await
        .pop()
        .unwrap_or_else(|| IngestResult::failure(fulfillment_core::IngestReason::InvalidPayload))
}
