//! # Fulfillment Engine
//!
//! The orchestration surface of the crate. One engine serves every tenant of
//! a deployment; tenant identity arrives with each call and flows through
//! every read and write.
//!
//! Each ingestion entry point runs the same pipeline: normalize the raw
//! input, persist the event under its idempotency key, attach it to an order
//! by tracking number, resolve the provider status through the mapping
//! registry, and drive the order state machine. Station bookkeeping, SLA
//! annotations, courier analytics, audit rows, and lifecycle events fall out
//! of those stages.
//!
//! Entry points never return `Err`. Carrier webhooks and upload jobs cannot
//! recover from an exception, so every outcome, including storage failures,
//! travels inside the returned [`IngestResult`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analytics::{CourierScorecard, PerformanceAggregator};
use crate::audit::{actions, entity_types, event_types, AuditLogger, DeadLetterQueue};
use crate::config::FulfillmentConfig;
use crate::constants::{events, system};
use crate::error::{FulfillmentError, Result};
use crate::events::EventPublisher;
use crate::idempotency::generate_idempotency_key;
use crate::ingestion::{
    self, IngestData, IngestReason, IngestResult, ManualEventRequest, NormalizedEvent,
};
use crate::logging;
use crate::mapping::{MappingRegistry, ResolvedMapping};
use crate::models::{
    DeadLetterEntry, IngestionMode, MappingRule, NewAuditLogEntry, NewDeadLetterEntry,
    NewShipmentEvent, OrderTransition, ShipmentEvent, TriggeredBy,
};
use crate::sla::{is_breached, StationMetricsView};
use crate::state_machine::{
    OrderState, OrderStateMachine, Station, StateMachineError, TransitionRequest,
};
use crate::storage::{EventInsert, FulfillmentStore};

/// Point-in-time status of one order, joined from the transition log and the
/// open station row
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderStatusView {
    pub order_id: i64,
    pub state: OrderState,
    pub station: Station,
    /// When the order entered its current station; None when no station row
    /// is open (terminal orders)
    pub entered_station_at: Option<DateTime<Utc>>,
    pub dwell_minutes: Option<i64>,
    pub sla_target_minutes: Option<i64>,
    pub sla_breached: bool,
}

/// Multi-tenant order fulfillment pipeline.
///
/// Generic over the storage backend so the same pipeline runs against
/// PostgreSQL in production and [`InMemoryStore`](crate::storage::InMemoryStore)
/// in tests and evaluation sandboxes.
pub struct FulfillmentEngine<S: FulfillmentStore> {
    store: Arc<S>,
    machine: OrderStateMachine<S>,
    mappings: MappingRegistry,
    audit: AuditLogger<S>,
    dead_letters: DeadLetterQueue<S>,
    analytics: PerformanceAggregator<S>,
    event_publisher: EventPublisher,
    config: FulfillmentConfig,
}

impl<S: FulfillmentStore> FulfillmentEngine<S> {
    /// Engine with default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, FulfillmentConfig::default())
    }

    /// Engine wired from an explicit configuration
    pub fn with_config(store: Arc<S>, config: FulfillmentConfig) -> Self {
        let event_publisher = EventPublisher::new(config.events.broadcast_capacity);
        let machine = OrderStateMachine::new(
            Arc::clone(&store),
            event_publisher.clone(),
            config.sla.targets(),
        );
        let mappings = if config.ingestion.seed_default_mappings {
            MappingRegistry::with_defaults()
        } else {
            MappingRegistry::new()
        };

        Self {
            machine,
            mappings,
            audit: AuditLogger::new(Arc::clone(&store)),
            dead_letters: DeadLetterQueue::new(Arc::clone(&store)),
            analytics: PerformanceAggregator::with_weights(
                Arc::clone(&store),
                config.analytics.weights,
            ),
            event_publisher,
            config,
            store,
        }
    }

    /// Publisher handle for subscribing to lifecycle events
    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    // ---- ingestion entry points ----

    /// Ingest one carrier webhook body.
    ///
    /// Bodies missing a tracking number or status are malformed and fail
    /// with [`IngestReason::InvalidPayload`]; nothing is stored for them.
    pub async fn submit_api_event(&self, tenant_id: Uuid, raw_body: &Value) -> IngestResult {
        match ingestion::normalize_api_payload(raw_body).into_iter().next() {
            Some(event) => self.process_event(tenant_id, event).await,
            None => {
                debug!(tenant_id = %tenant_id, "api body did not normalize, rejecting");
                IngestResult::failure(IngestReason::InvalidPayload)
            }
        }
    }

    /// Ingest a CSV batch upload, one result per resolvable row.
    ///
    /// Rows are independent: a row that fails or duplicates never stops the
    /// rows behind it. Files over the configured row cap are truncated.
    pub async fn submit_csv_batch(&self, tenant_id: Uuid, csv_text: &str) -> Vec<IngestResult> {
        let rows = ingestion::normalize_csv_batch_with_limit(
            csv_text,
            self.config.ingestion.max_csv_batch_rows,
        );
        let mut results = Vec::with_capacity(rows.len());
        for event in rows {
            results.push(self.process_event(tenant_id, event).await);
        }
        results
    }

    /// Ingest a carrier notification email body.
    ///
    /// Every tracking reference found in the body is processed; the returned
    /// result describes the primary (first) reference. A body with no
    /// reference still lands as an unroutable triage event.
    pub async fn submit_email_event(&self, tenant_id: Uuid, email_body: &str) -> IngestResult {
        let events = ingestion::normalize_email_body(email_body);
        if events.is_empty() {
            debug!(tenant_id = %tenant_id, "email body is empty, rejecting");
            return IngestResult::failure(IngestReason::InvalidPayload);
        }

        let mut primary = None;
        for event in events {
            let is_primary = event.is_primary;
            let result = self.process_event(tenant_id, event).await;
            if is_primary && primary.is_none() {
                primary = Some(result);
            } else {
                debug!(
                    tenant_id = %tenant_id,
                    success = result.success,
                    "secondary email reference processed"
                );
            }
        }
        primary.unwrap_or_else(|| IngestResult::failure(IngestReason::InvalidPayload))
    }

    /// Ingest a manual status entry from the operations dashboard
    pub async fn submit_manual_event(
        &self,
        tenant_id: Uuid,
        request: &ManualEventRequest,
    ) -> IngestResult {
        match ingestion::normalize_manual_entry(request).into_iter().next() {
            Some(event) => self.process_event(tenant_id, event).await,
            None => {
                debug!(tenant_id = %tenant_id, "manual entry did not normalize, rejecting");
                IngestResult::failure(IngestReason::InvalidPayload)
            }
        }
    }

    // ---- pipeline ----

    /// Run one normalized event through the full pipeline
    async fn process_event(&self, tenant_id: Uuid, event: NormalizedEvent) -> IngestResult {
        let idempotency_key = generate_idempotency_key(
            event.mode.workflow_name(),
            tenant_id,
            &event.idempotency_payload(),
        );

        let inserted = match self
            .store
            .insert_shipment_event(new_shipment_event(tenant_id, &idempotency_key, &event))
            .await
        {
            Ok(EventInsert::Inserted(row)) => row,
            Ok(EventInsert::Duplicate(existing)) => {
                return self.handle_duplicate(tenant_id, &idempotency_key, existing).await;
            }
            Err(error) => {
                warn!(tenant_id = %tenant_id, error = %error, "event persist failed");
                return self
                    .capture_failure(tenant_id, &event, "StoreError", &error.to_string())
                    .await;
            }
        };

        logging::log_ingest_operation(
            inserted.mode.as_str(),
            &tenant_id.to_string(),
            inserted.tracking_number.as_deref(),
            "accepted",
            None,
        );

        self.publish(
            events::SHIPMENT_EVENT_RECEIVED,
            json!({
                "tenant_id": tenant_id,
                "event_id": inserted.id,
                "tracking_number": inserted.tracking_number,
                "mode": inserted.mode.as_str(),
            }),
        )
        .await;

        let created_audit = self
            .audit
            .record(NewAuditLogEntry::new(
                tenant_id,
                event_types::SHIPMENT_INGEST,
                entity_types::SHIPMENT_EVENT,
                inserted.id.to_string(),
                actions::CREATED,
                json!({
                    "tracking_number": inserted.tracking_number,
                    "provider": inserted.provider,
                    "provider_status": inserted.provider_status,
                    "mode": inserted.mode.as_str(),
                }),
            ))
            .await;

        let Some(tracking_number) = inserted.tracking_number.clone() else {
            return self.handle_unroutable(tenant_id, &inserted).await;
        };

        let order_id = match self.store.resolve_order_id(tenant_id, &tracking_number).await {
            Ok(order_id) => order_id,
            Err(error) => {
                warn!(tenant_id = %tenant_id, error = %error, "order resolution failed");
                return self
                    .capture_failure(tenant_id, &event, "StoreError", &error.to_string())
                    .await;
            }
        };

        let Some(resolved) = self.resolve_mapping(tenant_id, &inserted) else {
            return self.handle_unresolved(tenant_id, order_id, &inserted).await;
        };

        if let Err(error) = self
            .store
            .set_event_internal_status(tenant_id, inserted.id, resolved.internal_status)
            .await
        {
            warn!(event_id = inserted.id, error = %error, "internal status stamp failed");
        }

        // Judged against the station the order occupied when delivery happened
        let delivered_on_time = if resolved.internal_status == OrderState::Delivered {
            Some(self.open_row_within_sla(tenant_id, order_id, event.occurred_at).await)
        } else {
            None
        };

        // Manual entries are operator actions; every other channel is a
        // carrier feed
        let trigger = if inserted.mode == IngestionMode::Manual {
            TriggeredBy::User
        } else {
            TriggeredBy::System
        };
        let request = TransitionRequest::from_event(
            tenant_id,
            order_id,
            resolved.internal_status,
            inserted.id,
            event.occurred_at,
        )
        .with_trigger(trigger)
        .with_metadata(json!({
            "provider": inserted.provider,
            "provider_status": inserted.provider_status,
            "mapping_tier": resolved.matched_tier.to_string(),
            "mode": inserted.mode.as_str(),
        }));

        match self.machine.transition(request).await {
            Ok(outcome) => {
                if !outcome.skipped && outcome.to_state.is_terminal() {
                    self.record_terminal_metrics(
                        tenant_id,
                        order_id,
                        &event,
                        outcome.to_state,
                        delivered_on_time.unwrap_or(true),
                    )
                    .await;
                }

                IngestResult::success(IngestData {
                    event_id: inserted.id,
                    order_id: Some(order_id),
                    internal_status: Some(outcome.to_state),
                    station: Some(outcome.station),
                    transition_id: outcome.transition_id(),
                })
                .with_audit_log(created_audit)
            }
            Err(error) if error.is_anomaly() => {
                self.handle_anomaly(tenant_id, order_id, &inserted, resolved.internal_status, &error)
                    .await
            }
            Err(error) => {
                warn!(order_id, error = %error, "transition failed");
                self.capture_failure(tenant_id, &event, "StateMachineError", &error.to_string())
                    .await
            }
        }
    }

    /// Mapping lookup for an event, None when any input is missing
    fn resolve_mapping(&self, tenant_id: Uuid, event: &ShipmentEvent) -> Option<ResolvedMapping> {
        let provider_status = event.provider_status.as_deref()?;
        self.mappings
            .resolve(tenant_id, event.provider.as_deref(), provider_status)
    }

    async fn handle_duplicate(
        &self,
        tenant_id: Uuid,
        idempotency_key: &str,
        existing: ShipmentEvent,
    ) -> IngestResult {
        debug!(
            tenant_id = %tenant_id,
            event_id = existing.id,
            "idempotency key already recorded, skipping"
        );

        self.publish(
            events::SHIPMENT_EVENT_DUPLICATE,
            json!({
                "tenant_id": tenant_id,
                "event_id": existing.id,
                "idempotency_key": idempotency_key,
            }),
        )
        .await;

        let audit_id = self
            .audit
            .record(NewAuditLogEntry::new(
                tenant_id,
                event_types::SHIPMENT_INGEST,
                entity_types::SHIPMENT_EVENT,
                existing.id.to_string(),
                actions::DUPLICATE_SKIPPED,
                json!({ "idempotency_key": idempotency_key, "mode": existing.mode.as_str() }),
            ))
            .await;

        let order_id = match &existing.tracking_number {
            Some(tracking) => self
                .store
                .find_order_id(tenant_id, tracking)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        IngestResult::duplicate(IngestData {
            event_id: existing.id,
            order_id,
            internal_status: existing.internal_status,
            station: existing.internal_status.map(|state| state.station()),
            transition_id: None,
        })
        .with_audit_log(audit_id)
    }

    async fn handle_unroutable(&self, tenant_id: Uuid, event: &ShipmentEvent) -> IngestResult {
        self.publish(
            events::SHIPMENT_EVENT_UNROUTABLE,
            json!({
                "tenant_id": tenant_id,
                "event_id": event.id,
                "mode": event.mode.as_str(),
            }),
        )
        .await;

        let audit_id = self
            .audit
            .record(NewAuditLogEntry::new(
                tenant_id,
                event_types::SHIPMENT_INGEST,
                entity_types::SHIPMENT_EVENT,
                event.id.to_string(),
                actions::UNROUTABLE,
                json!({ "mode": event.mode.as_str(), "description": event.description }),
            ))
            .await;

        IngestResult::success_with_reason(
            Some(IngestData {
                event_id: event.id,
                order_id: None,
                internal_status: None,
                station: None,
                transition_id: None,
            }),
            IngestReason::NoTrackingReference,
        )
        .with_audit_log(audit_id)
    }

    async fn handle_unresolved(
        &self,
        tenant_id: Uuid,
        order_id: i64,
        event: &ShipmentEvent,
    ) -> IngestResult {
        self.publish(
            events::SHIPMENT_MAPPING_UNRESOLVED,
            json!({
                "tenant_id": tenant_id,
                "event_id": event.id,
                "order_id": order_id,
                "provider": event.provider,
                "provider_status": event.provider_status,
            }),
        )
        .await;

        let audit_id = self
            .audit
            .record(NewAuditLogEntry::new(
                tenant_id,
                event_types::SHIPMENT_INGEST,
                entity_types::SHIPMENT_EVENT,
                event.id.to_string(),
                actions::UNRESOLVED_MAPPING,
                json!({
                    "provider": event.provider,
                    "provider_status": event.provider_status,
                }),
            ))
            .await;

        IngestResult::success_with_reason(
            Some(IngestData {
                event_id: event.id,
                order_id: Some(order_id),
                internal_status: None,
                station: None,
                transition_id: None,
            }),
            IngestReason::UnresolvedStatusMapping,
        )
        .with_audit_log(audit_id)
    }

    async fn handle_anomaly(
        &self,
        tenant_id: Uuid,
        order_id: i64,
        event: &ShipmentEvent,
        attempted: OrderState,
        error: &StateMachineError,
    ) -> IngestResult {
        warn!(
            order_id,
            attempted = %attempted,
            error = %error,
            "terminal state regression rejected, order preserved"
        );

        self.publish(
            events::ORDER_ANOMALY_DETECTED,
            json!({
                "tenant_id": tenant_id,
                "order_id": order_id,
                "event_id": event.id,
                "attempted_state": attempted,
                "error": error.to_string(),
            }),
        )
        .await;

        let audit_id = self
            .audit
            .record(NewAuditLogEntry::new(
                tenant_id,
                event_types::ORDER_TRANSITION,
                entity_types::ORDER,
                order_id.to_string(),
                actions::ANOMALY_REJECTED,
                json!({
                    "attempted_state": attempted,
                    "source_event_id": event.id,
                    "error": error.to_string(),
                }),
            ))
            .await;

        IngestResult::success_with_reason(
            Some(IngestData {
                event_id: event.id,
                order_id: Some(order_id),
                internal_status: None,
                station: None,
                transition_id: None,
            }),
            IngestReason::TerminalStateAnomaly,
        )
        .with_audit_log(audit_id)
    }

    /// Park a payload that failed processing and answer with a failure result
    async fn capture_failure(
        &self,
        tenant_id: Uuid,
        event: &NormalizedEvent,
        error_class: &str,
        error_message: &str,
    ) -> IngestResult {
        let payload = serde_json::to_value(event).unwrap_or(Value::Null);
        let mut entry = NewDeadLetterEntry::new(
            tenant_id,
            event.mode.workflow_name(),
            payload,
            error_class,
            error_message,
        );
        entry.max_retries = self.config.retry.max_retries;

        let captured = self.dead_letters.capture(entry).await;
        if let Some(row) = &captured {
            self.publish(
                events::DEAD_LETTER_CAPTURED,
                json!({
                    "tenant_id": tenant_id,
                    "dead_letter_id": row.id,
                    "workflow": row.workflow,
                    "error_class": row.error_class,
                }),
            )
            .await;
        }

        let audit_id = self
            .audit
            .record(NewAuditLogEntry::new(
                tenant_id,
                event_types::SHIPMENT_INGEST,
                entity_types::DEAD_LETTER,
                captured.as_ref().map(|row| row.id.to_string()).unwrap_or_default(),
                actions::FAILED,
                json!({
                    "workflow": event.mode.workflow_name(),
                    "error_class": error_class,
                    "error_message": error_message,
                }),
            ))
            .await;

        IngestResult::failure(IngestReason::StorageFailure).with_audit_log(audit_id)
    }

    /// Whether the currently open station row is inside its SLA at `at`.
    /// Orders with no open row (first event is the delivery) count on time.
    async fn open_row_within_sla(&self, tenant_id: Uuid, order_id: i64, at: DateTime<Utc>) -> bool {
        match self.store.open_station_row(tenant_id, order_id).await {
            Ok(Some(row)) => !is_breached(&row, at),
            Ok(None) => true,
            Err(error) => {
                warn!(order_id, error = %error, "open station row lookup failed");
                true
            }
        }
    }

    /// Fold a terminal transition into the courier daily buckets.
    /// Analytics are advisory and never fail the ingest that fed them.
    async fn record_terminal_metrics(
        &self,
        tenant_id: Uuid,
        order_id: i64,
        event: &NormalizedEvent,
        terminal_state: OrderState,
        on_time: bool,
    ) {
        let courier = event
            .provider
            .clone()
            .unwrap_or_else(|| system::UNKNOWN.to_string());
        let region = event
            .location
            .clone()
            .unwrap_or_else(|| self.config.analytics.default_region.clone());
        let date = event.occurred_at.date_naive();

        let outcome = match terminal_state {
            OrderState::Delivered => {
                let pickup_hours = self.pickup_hours(tenant_id, order_id).await;
                self.analytics
                    .record_delivery(tenant_id, &courier, &region, date, on_time, pickup_hours)
                    .await
            }
            OrderState::ReturnReceived => {
                self.analytics
                    .record_return(tenant_id, &courier, &region, date)
                    .await
            }
            _ => return,
        };

        if let Err(error) = outcome {
            warn!(
                order_id,
                courier = %courier,
                error = %error,
                "courier bucket update failed"
            );
        }
    }

    /// Hours from first recorded transition to carrier pickup, when both
    /// points exist in the order history
    async fn pickup_hours(&self, tenant_id: Uuid, order_id: i64) -> Option<f64> {
        let history = match self.store.list_order_transitions(tenant_id, order_id).await {
            Ok(history) => history,
            Err(error) => {
                warn!(order_id, error = %error, "history lookup failed");
                return None;
            }
        };
        let first = history.first()?;
        let shipped = history
            .iter()
            .find(|row| row.to_state == OrderState::Shipped)?;
        let seconds = (shipped.occurred_at - first.occurred_at).num_seconds();
        Some(seconds.max(0) as f64 / 3600.0)
    }

    async fn publish(&self, event_name: &str, context: Value) {
        if let Err(error) = self.event_publisher.publish(event_name, context).await {
            warn!(event_name = %event_name, error = %error, "event publish failed");
        }
    }

    // ---- order queries ----

    /// Current status of an order, annotated with station dwell and SLA
    pub async fn order_status(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> Result<Option<OrderStatusView>> {
        let Some(state) = self
            .store
            .current_order_state(tenant_id, order_id)
            .await
            .map_err(storage_error)?
        else {
            return Ok(None);
        };

        let open_row = self
            .store
            .open_station_row(tenant_id, order_id)
            .await
            .map_err(storage_error)?;
        let now = Utc::now();

        Ok(Some(OrderStatusView {
            order_id,
            state,
            station: state.station(),
            entered_station_at: open_row.as_ref().map(|row| row.entered_at),
            dwell_minutes: open_row.as_ref().map(|row| row.dwell_minutes(now)),
            sla_target_minutes: open_row.as_ref().map(|row| row.sla_target_minutes),
            sla_breached: open_row.as_ref().is_some_and(|row| is_breached(row, now)),
        }))
    }

    /// Order status looked up by carrier tracking number
    pub async fn order_status_by_tracking(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> Result<Option<OrderStatusView>> {
        match self
            .store
            .find_order_id(tenant_id, tracking_number)
            .await
            .map_err(storage_error)?
        {
            Some(order_id) => self.order_status(tenant_id, order_id).await,
            None => Ok(None),
        }
    }

    /// Full transition history of an order, oldest first
    pub async fn order_history(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> Result<Vec<OrderTransition>> {
        self.store
            .list_order_transitions(tenant_id, order_id)
            .await
            .map_err(storage_error)
    }

    /// Events recorded for a tracking number, oldest first
    pub async fn shipment_events(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> Result<Vec<ShipmentEvent>> {
        self.store
            .list_shipment_events(tenant_id, tracking_number)
            .await
            .map_err(storage_error)
    }

    /// Reopen a delivered order into the return flow.
    ///
    /// The single sanctioned exit from a terminal state; only explicit
    /// operator calls reach it, never carrier events.
    pub async fn reopen_for_return(
        &self,
        tenant_id: Uuid,
        order_id: i64,
        note: Option<String>,
    ) -> Result<OrderTransition> {
        let outcome = self
            .machine
            .reopen_for_return(tenant_id, order_id, Utc::now(), json!({ "note": note }))
            .await
            .map_err(|error| FulfillmentError::StateTransitionError(error.to_string()))?;

        outcome.transition.ok_or_else(|| {
            FulfillmentError::StateTransitionError(
                "reopen produced no transition row".to_string(),
            )
        })
    }

    // ---- station queries ----

    /// Open station rows annotated with dwell and breach status.
    ///
    /// This is the operations work queue: every order currently parked at a
    /// station, optionally narrowed to one station or to breaches only.
    pub async fn station_metrics(
        &self,
        tenant_id: Uuid,
        station: Option<Station>,
        breached_only: bool,
    ) -> Result<Vec<StationMetricsView>> {
        let rows = self
            .store
            .list_station_rows(tenant_id, station, true)
            .await
            .map_err(storage_error)?;
        let now = Utc::now();

        Ok(rows
            .into_iter()
            .map(|row| StationMetricsView::from_row(row, now))
            .filter(|view| !breached_only || view.breached)
            .collect())
    }

    /// Flag every open station row past its SLA target.
    ///
    /// Intended for a periodic scheduler tick. Each breach publishes a
    /// lifecycle event and writes an audit row; the flagged views are
    /// returned for dashboards.
    pub async fn sweep_breached_stations(&self, tenant_id: Uuid) -> Result<Vec<StationMetricsView>> {
        let breached = self.station_metrics(tenant_id, None, true).await?;

        for view in &breached {
            logging::log_station_operation(
                "sla_breach",
                view.row.order_id,
                &view.row.station.to_string(),
                Some(view.dwell_minutes),
                None,
            );

            self.publish(
                events::STATION_SLA_BREACHED,
                json!({
                    "tenant_id": tenant_id,
                    "order_id": view.row.order_id,
                    "station": view.row.station,
                    "dwell_minutes": view.dwell_minutes,
                    "sla_target_minutes": view.row.sla_target_minutes,
                }),
            )
            .await;

            self.audit
                .record(NewAuditLogEntry::new(
                    tenant_id,
                    event_types::SLA_SWEEP,
                    entity_types::STATION_METRICS,
                    view.row.id.to_string(),
                    actions::BREACH_FLAGGED,
                    json!({
                        "order_id": view.row.order_id,
                        "station": view.row.station,
                        "dwell_minutes": view.dwell_minutes,
                    }),
                ))
                .await;
        }

        Ok(breached)
    }

    // ---- courier analytics ----

    /// Composite scorecards over the courier daily buckets in a date range
    pub async fn courier_performance(
        &self,
        tenant_id: Uuid,
        courier: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CourierScorecard>> {
        self.analytics
            .scorecards(tenant_id, courier, from, to)
            .await
            .map_err(storage_error)
    }

    // ---- mapping administration ----

    /// Insert or replace a mapping rule, with an audit row and lifecycle
    /// event describing the change
    pub async fn upsert_mapping_rule(&self, rule: MappingRule) -> Result<Option<MappingRule>> {
        let replaced = self.mappings.upsert_rule(rule.clone())?;

        self.publish(
            events::MAPPING_RULE_UPSERTED,
            json!({
                "tenant_id": rule.tenant_id,
                "provider": rule.provider,
                "provider_status": rule.provider_status,
                "internal_status": rule.internal_status,
            }),
        )
        .await;

        self.audit
            .record(NewAuditLogEntry::new(
                rule.tenant_id.unwrap_or_default(),
                event_types::MAPPING_CHANGE,
                entity_types::MAPPING_RULE,
                format!("{}:{}", rule.provider, rule.provider_status),
                actions::RULE_UPSERTED,
                json!({
                    "internal_status": rule.internal_status,
                    "replaced": replaced.is_some(),
                }),
            ))
            .await;

        Ok(replaced)
    }

    /// Remove a mapping rule, returning it when one was present
    pub async fn remove_mapping_rule(
        &self,
        tenant_id: Option<Uuid>,
        provider: &str,
        provider_status: &str,
    ) -> Result<Option<MappingRule>> {
        let removed = self.mappings.remove_rule(tenant_id, provider, provider_status);

        if let Some(rule) = &removed {
            self.publish(
                events::MAPPING_RULE_REMOVED,
                json!({
                    "tenant_id": rule.tenant_id,
                    "provider": rule.provider,
                    "provider_status": rule.provider_status,
                }),
            )
            .await;

            self.audit
                .record(NewAuditLogEntry::new(
                    rule.tenant_id.unwrap_or_default(),
                    event_types::MAPPING_CHANGE,
                    entity_types::MAPPING_RULE,
                    format!("{}:{}", rule.provider, rule.provider_status),
                    actions::RULE_REMOVED,
                    json!({ "internal_status": rule.internal_status }),
                ))
                .await;
        }

        Ok(removed)
    }

    /// Override rules scoped to one tenant
    pub fn tenant_mapping_rules(&self, tenant_id: Uuid) -> Vec<MappingRule> {
        self.mappings.rules_for_tenant(tenant_id)
    }

    /// Global rules, provider defaults and wildcards alike
    pub fn global_mapping_rules(&self) -> Vec<MappingRule> {
        self.mappings.global_rules()
    }

    // ---- audit and dead letters ----

    /// Recent audit entries for a tenant, newest first
    pub async fn audit_trail(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<crate::models::AuditLogEntry>> {
        self.audit
            .recent(tenant_id, entity_type, limit)
            .await
            .map_err(storage_error)
    }

    /// Unresolved dead letters awaiting replay, oldest first
    pub async fn pending_dead_letters(&self, tenant_id: Uuid) -> Result<Vec<DeadLetterEntry>> {
        self.dead_letters.pending(tenant_id).await.map_err(storage_error)
    }

    /// Replay one dead letter through the pipeline.
    ///
    /// The attempt is counted before processing so a crash mid-replay still
    /// burns budget. A successful run (including an idempotent duplicate)
    /// resolves the entry.
    pub async fn replay_dead_letter(&self, tenant_id: Uuid, dead_letter_id: i64) -> IngestResult {
        let pending = match self.dead_letters.pending(tenant_id).await {
            Ok(pending) => pending,
            Err(error) => {
                warn!(dead_letter_id, error = %error, "pending queue read failed");
                return IngestResult::failure(IngestReason::StorageFailure);
            }
        };
        let Some(entry) = pending.into_iter().find(|entry| entry.id == dead_letter_id) else {
            debug!(dead_letter_id, "dead letter not pending, nothing to replay");
            return IngestResult::failure(IngestReason::InvalidPayload);
        };
        if !entry.can_retry() {
            return IngestResult::failure(IngestReason::RetriesExhausted);
        }

        let event: NormalizedEvent = match serde_json::from_value(entry.payload.clone()) {
            Ok(event) => event,
            Err(error) => {
                warn!(dead_letter_id, error = %error, "dead letter payload unreadable");
                return IngestResult::failure(IngestReason::InvalidPayload);
            }
        };

        if let Err(error) = self.dead_letters.record_attempt(tenant_id, dead_letter_id).await {
            warn!(dead_letter_id, error = %error, "attempt bookkeeping failed");
        }

        let result = self.process_event(tenant_id, event).await;
        if result.success {
            match self.dead_letters.resolve(tenant_id, dead_letter_id).await {
                Ok(resolved) => {
                    self.publish(
                        events::DEAD_LETTER_RESOLVED,
                        json!({
                            "tenant_id": tenant_id,
                            "dead_letter_id": resolved.id,
                            "workflow": resolved.workflow,
                            "retry_count": resolved.retry_count,
                        }),
                    )
                    .await;
                    self.audit
                        .record(NewAuditLogEntry::new(
                            tenant_id,
                            event_types::SHIPMENT_INGEST,
                            entity_types::DEAD_LETTER,
                            resolved.id.to_string(),
                            actions::REPLAYED,
                            json!({ "retry_count": resolved.retry_count }),
                        ))
                        .await;
                }
                Err(error) => {
                    warn!(dead_letter_id, error = %error, "resolve bookkeeping failed");
                }
            }
        }
        result
    }
}

fn new_shipment_event(
    tenant_id: Uuid,
    idempotency_key: &str,
    event: &NormalizedEvent,
) -> NewShipmentEvent {
    NewShipmentEvent {
        tenant_id,
        idempotency_key: idempotency_key.to_string(),
        tracking_number: event.tracking_number.clone(),
        provider: event.provider.clone(),
        provider_status: event.provider_status.clone(),
        internal_status: None,
        mode: event.mode,
        location: event.location.clone(),
        description: event.description.clone(),
        is_primary: event.is_primary,
        payload: serde_json::to_value(event).unwrap_or(Value::Null),
        occurred_at: event.occurred_at,
    }
}

fn storage_error(error: crate::storage::StoreError) -> FulfillmentError {
    FulfillmentError::StorageError(error.to_string())
}
