//! # Ingestion Pipeline Integration Tests
//!
//! End-to-end coverage of the four ingestion channels feeding one engine:
//! ordered history out of webhook sequences, idempotent replays, CSV batch
//! behavior, email reference scanning, manual entries, and the dead-letter
//! path when storage misbehaves.

mod common;

use std::sync::Arc;

use anyhow::Result;
use common::*;
use fulfillment_core::audit::{actions, entity_types};
use fulfillment_core::config::{FulfillmentConfig, IngestionConfig};
use fulfillment_core::state_machine::{OrderState, Station};
use fulfillment_core::storage::FulfillmentStore;
use fulfillment_core::{
    system_events, FulfillmentEngine, IngestReason, ManualEventRequest, TriggeredBy,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_webhook_sequence_builds_ordered_history() -> Result<()> {
    let (engine, store, tenant) = engine();
    let base = hours_ago(3);

    let result = deliver_order(&engine, tenant, "ARX100000001", "aramex", base).await;
    assert!(result.success);
    assert!(!result.skipped);
    let data = result.data.expect("delivered ingest carries data");
    assert_eq!(data.internal_status, Some(OrderState::Delivered));
    assert_eq!(data.station, Some(Station::Finance));
    assert!(data.transition_id.is_some());

    let order_id = data.order_id.expect("order id resolved");
    let history = engine.order_history(tenant, order_id).await?;
    assert_eq!(history.len(), 5);
    let sort_keys: Vec<i32> = history.iter().map(|row| row.sort_key).collect();
    assert_eq!(sort_keys, vec![1, 2, 3, 4, 5]);
    assert_eq!(history.iter().filter(|row| row.most_recent).count(), 1);

    let last = history.last().expect("final transition");
    assert!(last.most_recent);
    assert_eq!(last.to_state, OrderState::Delivered);
    assert_eq!(history[0].from_state, None);
    assert_eq!(history[0].to_state, OrderState::OperationsPending);

    let events = engine.shipment_events(tenant, "ARX100000001").await?;
    assert_eq!(events.len(), 5);
    assert!(events.iter().all(|event| event.internal_status.is_some()));

    // One closed operations row, one finance row still open
    let rows = store.list_station_rows(tenant, None, false).await?;
    assert_eq!(rows.len(), 2);
    let operations = rows
        .iter()
        .find(|row| row.station == Station::Operations)
        .expect("operations row");
    assert!(operations.exited_at.is_some());
    let finance = rows
        .iter()
        .find(|row| row.station == Station::Finance)
        .expect("finance row");
    assert!(finance.is_open());
    Ok(())
}

#[tokio::test]
async fn test_replayed_webhook_body_is_idempotent() -> Result<()> {
    let (engine, _store, tenant) = engine();
    let body = api_body_at("ARX200000002", "aramex", "picked_up", hours_ago(1));

    let first = engine.submit_api_event(tenant, &body).await;
    assert!(first.success);
    assert!(!first.skipped);

    let second = engine.submit_api_event(tenant, &body).await;
    assert!(second.success);
    assert!(second.skipped);
    assert_eq!(second.reason, Some(IngestReason::DuplicateEvent));

    let first_data = first.data.expect("first ingest data");
    let second_data = second.data.expect("duplicate points at original");
    assert_eq!(second_data.event_id, first_data.event_id);
    assert_eq!(second_data.order_id, first_data.order_id);
    assert_eq!(second_data.transition_id, None);

    let events = engine.shipment_events(tenant, "ARX200000002").await?;
    assert_eq!(events.len(), 1);
    let history = engine
        .order_history(tenant, first_data.order_id.expect("order id"))
        .await?;
    assert_eq!(history.len(), 1);

    let audits = engine
        .audit_trail(tenant, Some(entity_types::SHIPMENT_EVENT), 10)
        .await?;
    assert!(audits.iter().any(|entry| entry.action == actions::DUPLICATE_SKIPPED));
    Ok(())
}

#[tokio::test]
async fn test_malformed_webhook_body_is_rejected() -> Result<()> {
    let (engine, _store, tenant) = engine();

    let result = engine
        .submit_api_event(tenant, &json!({ "status": "delivered" }))
        .await;
    assert!(!result.success);
    assert_eq!(result.reason, Some(IngestReason::InvalidPayload));
    assert!(result.data.is_none());

    // Nothing was persisted for the rejected body
    let audits = engine.audit_trail(tenant, None, 10).await?;
    assert!(audits.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_csv_batch_mixes_mapped_and_unmapped_rows() -> Result<()> {
    let (engine, _store, tenant) = engine();
    let csv = "tracking_number,provider,status\n\
               CSV300000001,aramex,delivered\n\
               ,aramex,pending\n\
               CSV300000002,aramex,held_at_customs\n";

    let results = engine.submit_csv_batch(tenant, csv).await;
    assert_eq!(results.len(), 2, "blank tracking row is dropped");

    let delivered = &results[0];
    assert!(delivered.success);
    assert_eq!(
        delivered.data.as_ref().and_then(|data| data.internal_status),
        Some(OrderState::Delivered)
    );

    let unmapped = &results[1];
    assert!(unmapped.success);
    assert_eq!(unmapped.reason, Some(IngestReason::UnresolvedStatusMapping));
    let unmapped_data = unmapped.data.as_ref().expect("event was stored");
    assert_eq!(unmapped_data.internal_status, None);
    assert_eq!(unmapped_data.transition_id, None);

    let order_id = unmapped_data.order_id.expect("order resolved for triage");
    assert!(engine.order_history(tenant, order_id).await?.is_empty());

    let events = engine.shipment_events(tenant, "CSV300000002").await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].internal_status, None);
    Ok(())
}

#[tokio::test]
async fn test_csv_batch_respects_configured_row_cap() -> Result<()> {
    let config = FulfillmentConfig {
        ingestion: IngestionConfig {
            max_csv_batch_rows: 2,
            ..IngestionConfig::default()
        },
        ..FulfillmentConfig::default()
    };
    let (engine, _store, tenant) = engine_with_config(config);

    let csv = "tracking_number,provider,status\n\
               CAP400000001,dhl,pending\n\
               CAP400000002,dhl,pending\n\
               CAP400000003,dhl,pending\n\
               CAP400000004,dhl,pending\n";
    let results = engine.submit_csv_batch(tenant, csv).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.success));

    assert!(engine.shipment_events(tenant, "CAP400000003").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_email_with_two_references_processes_both() -> Result<()> {
    let (engine, _store, tenant) = engine();
    let body = "Courier update: shipments AWB500000123 and DHL600000456 were delivered today.";

    let result = engine.submit_email_event(tenant, body).await;
    assert!(result.success);

    // The returned result describes the first reference in the body
    let data = result.data.expect("primary reference data");
    let primary_events = engine.shipment_events(tenant, "AWB500000123").await?;
    assert_eq!(primary_events.len(), 1);
    assert_eq!(primary_events[0].id, data.event_id);
    assert!(primary_events[0].is_primary);

    // The secondary reference was ingested on its own order
    let secondary_events = engine.shipment_events(tenant, "DHL600000456").await?;
    assert_eq!(secondary_events.len(), 1);
    assert!(!secondary_events[0].is_primary);
    assert_eq!(secondary_events[0].internal_status, Some(OrderState::Delivered));

    let secondary_status = engine
        .order_status_by_tracking(tenant, "DHL600000456")
        .await?
        .expect("secondary order exists");
    assert_eq!(secondary_status.state, OrderState::Delivered);
    Ok(())
}

#[tokio::test]
async fn test_empty_email_body_is_rejected() -> Result<()> {
    let (engine, _store, tenant) = engine();

    let result = engine.submit_email_event(tenant, "   \n ").await;
    assert!(!result.success);
    assert_eq!(result.reason, Some(IngestReason::InvalidPayload));
    Ok(())
}

#[tokio::test]
async fn test_manual_entry_records_dashboard_note() -> Result<()> {
    let (engine, _store, tenant) = engine();
    let request = ManualEventRequest {
        tracking_number: "MAN700000001".to_string(),
        status: "out_for_delivery".to_string(),
        note: Some("courier called, second attempt this afternoon".to_string()),
        provider: Some("smsa".to_string()),
        occurred_at: Some(minutes_ago(10)),
    };

    let result = engine.submit_manual_event(tenant, &request).await;
    assert!(result.success);
    let data = result.data.expect("manual ingest data");
    assert_eq!(data.internal_status, Some(OrderState::OutForDelivery));
    assert_eq!(data.station, Some(Station::Operations));

    let events = engine.shipment_events(tenant, "MAN700000001").await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].mode.as_str(), "manual");
    assert_eq!(
        events[0].description.as_deref(),
        Some("courier called, second attempt this afternoon")
    );

    // Dashboard entries are attributed to the operator, not the carrier feed
    let order_id = data.order_id.expect("order resolved");
    let history = engine.order_history(tenant, order_id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].triggered_by, TriggeredBy::User);
    Ok(())
}

#[tokio::test]
async fn test_storage_outage_parks_webhook_for_replay() -> Result<()> {
    let store = Arc::new(FailingStore::new());
    let engine = FulfillmentEngine::new(Arc::clone(&store));
    let tenant = Uuid::new_v4();
    let body = api_body_at("OUT800000001", "fedex", "delivered", hours_ago(2));

    store.fail_event_inserts(true);
    let failed = engine.submit_api_event(tenant, &body).await;
    assert!(!failed.success);
    assert_eq!(failed.reason, Some(IngestReason::StorageFailure));
    assert!(failed.audit_log_id.is_some());

    let pending = engine.pending_dead_letters(tenant).await?;
    assert_eq!(pending.len(), 1);
    let entry = &pending[0];
    assert_eq!(entry.workflow, "shipment_ingest_api");
    assert_eq!(entry.error_class, "StoreError");
    assert_eq!(entry.retry_count, 0);
    assert!(entry.can_retry());

    let failure_audits = engine
        .audit_trail(tenant, Some(entity_types::DEAD_LETTER), 10)
        .await?;
    assert!(failure_audits.iter().any(|audit| audit.action == actions::FAILED));

    // Outage over: the replay runs the parked payload through the pipeline
    store.fail_event_inserts(false);
    let mut lifecycle = engine.event_publisher().subscribe();
    let replayed = engine.replay_dead_letter(tenant, entry.id).await;
    assert!(replayed.success);
    assert_eq!(
        replayed.data.as_ref().and_then(|data| data.internal_status),
        Some(OrderState::Delivered)
    );

    assert!(engine.pending_dead_letters(tenant).await?.is_empty());
    let replay_audits = engine
        .audit_trail(tenant, Some(entity_types::DEAD_LETTER), 10)
        .await?;
    assert!(replay_audits.iter().any(|audit| audit.action == actions::REPLAYED));

    let mut published = Vec::new();
    while let Ok(event) = lifecycle.try_recv() {
        published.push(event.name);
    }
    assert!(published.iter().any(|name| name == system_events::DEAD_LETTER_RESOLVED));
    Ok(())
}

#[tokio::test]
async fn test_replay_budget_exhausts_after_max_attempts() -> Result<()> {
    let store = Arc::new(FailingStore::new());
    let engine = FulfillmentEngine::new(Arc::clone(&store));
    let tenant = Uuid::new_v4();

    store.fail_event_inserts(true);
    let failed = engine
        .submit_api_event(tenant, &api_body_at("OUT900000009", "fedex", "pending", hours_ago(1)))
        .await;
    assert!(!failed.success);
    store.fail_event_inserts(false);

    let entry_id = engine.pending_dead_letters(tenant).await?[0].id;
    for _ in 0..3 {
        store.record_dead_letter_attempt(tenant, entry_id).await?;
    }

    let exhausted = engine.replay_dead_letter(tenant, entry_id).await;
    assert!(!exhausted.success);
    assert_eq!(exhausted.reason, Some(IngestReason::RetriesExhausted));

    // The entry stays visible so operators can see it ran out of budget
    let pending = engine.pending_dead_letters(tenant).await?;
    assert_eq!(pending.len(), 1);
    assert!(pending[0].is_exhausted());
    Ok(())
}

#[tokio::test]
async fn test_same_tracking_number_isolated_per_tenant() -> Result<()> {
    let (engine, _store, tenant_a) = engine();
    let tenant_b = Uuid::new_v4();
    let tracking = "SHR110000001";

    let delivered = deliver_order(&engine, tenant_a, tracking, "aramex", hours_ago(4)).await;
    assert!(delivered.success);

    let pending = engine
        .submit_api_event(tenant_b, &api_body_at(tracking, "aramex", "pending", hours_ago(1)))
        .await;
    assert!(pending.success);

    let status_a = engine
        .order_status_by_tracking(tenant_a, tracking)
        .await?
        .expect("tenant a order");
    let status_b = engine
        .order_status_by_tracking(tenant_b, tracking)
        .await?
        .expect("tenant b order");
    assert_eq!(status_a.state, OrderState::Delivered);
    assert_eq!(status_b.state, OrderState::OperationsPending);
    assert_ne!(status_a.order_id, status_b.order_id);

    assert_eq!(engine.shipment_events(tenant_a, tracking).await?.len(), 5);
    assert_eq!(engine.shipment_events(tenant_b, tracking).await?.len(), 1);

    let audits_b = engine.audit_trail(tenant_b, None, 50).await?;
    assert!(!audits_b.is_empty());
    assert!(audits_b.iter().all(|entry| entry.tenant_id == tenant_b));
    Ok(())
}
