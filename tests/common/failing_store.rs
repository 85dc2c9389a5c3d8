//! Store wrapper whose writes can be forced to fail, for exercising the
//! dead-letter capture and replay paths.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use fulfillment_core::models::{
    AuditLogEntry, CourierBucketUpdate, CourierPerformanceDaily, DeadLetterEntry,
    NewAuditLogEntry, NewDeadLetterEntry, NewOrderTransition, NewShipmentEvent, OrderTransition,
    ShipmentEvent, StationMetricsRow,
};
use fulfillment_core::state_machine::{OrderState, Station};
use fulfillment_core::storage::{
    EventInsert, FulfillmentStore, InMemoryStore, StationChange, StoreError, StoreResult,
};
use uuid::Uuid;

/// In-memory store with switchable outages.
///
/// Flipping a flag makes the matching write fail with a backend error while
/// every other operation keeps working, so the audit trail and dead-letter
/// queue written during the failure stay readable.
pub struct FailingStore {
    inner: InMemoryStore,
    fail_event_inserts: AtomicBool,
    fail_transitions: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_event_inserts: AtomicBool::new(false),
            fail_transitions: AtomicBool::new(false),
        }
    }

    /// Make every shipment event insert fail until lifted
    pub fn fail_event_inserts(&self, fail: bool) {
        self.fail_event_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every transition append fail until lifted
    pub fn fail_transitions(&self, fail: bool) {
        self.fail_transitions.store(fail, Ordering::SeqCst);
    }

    fn outage() -> StoreError {
        StoreError::Backend("simulated storage outage".to_string())
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FulfillmentStore for FailingStore {
    async fn insert_shipment_event(&self, event: NewShipmentEvent) -> StoreResult<EventInsert> {
        if self.fail_event_inserts.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.insert_shipment_event(event).await
    }

    async fn set_event_internal_status(
        &self,
        tenant_id: Uuid,
        event_id: i64,
        status: OrderState,
    ) -> StoreResult<()> {
        self.inner
            .set_event_internal_status(tenant_id, event_id, status)
            .await
    }

    async fn list_shipment_events(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Vec<ShipmentEvent>> {
        self.inner.list_shipment_events(tenant_id, tracking_number).await
    }

    async fn resolve_order_id(&self, tenant_id: Uuid, tracking_number: &str) -> StoreResult<i64> {
        self.inner.resolve_order_id(tenant_id, tracking_number).await
    }

    async fn find_order_id(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Option<i64>> {
        self.inner.find_order_id(tenant_id, tracking_number).await
    }

    async fn current_order_state(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<OrderState>> {
        self.inner.current_order_state(tenant_id, order_id).await
    }

    async fn append_order_transition(
        &self,
        new_transition: NewOrderTransition,
        station_change: StationChange,
    ) -> StoreResult<OrderTransition> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner
            .append_order_transition(new_transition, station_change)
            .await
    }

    async fn list_order_transitions(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Vec<OrderTransition>> {
        self.inner.list_order_transitions(tenant_id, order_id).await
    }

    async fn open_station_row(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<StationMetricsRow>> {
        self.inner.open_station_row(tenant_id, order_id).await
    }

    async fn list_station_rows(
        &self,
        tenant_id: Uuid,
        station: Option<Station>,
        open_only: bool,
    ) -> StoreResult<Vec<StationMetricsRow>> {
        self.inner.list_station_rows(tenant_id, station, open_only).await
    }

    async fn apply_courier_update(
        &self,
        update: CourierBucketUpdate,
    ) -> StoreResult<CourierPerformanceDaily> {
        self.inner.apply_courier_update(update).await
    }

    async fn list_courier_performance(
        &self,
        tenant_id: Uuid,
        courier: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<CourierPerformanceDaily>> {
        self.inner
            .list_courier_performance(tenant_id, courier, from, to)
            .await
    }

    async fn append_audit_log(&self, entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry> {
        self.inner.append_audit_log(entry).await
    }

    async fn list_audit_logs(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        self.inner.list_audit_logs(tenant_id, entity_type, limit).await
    }

    async fn append_dead_letter(&self, entry: NewDeadLetterEntry) -> StoreResult<DeadLetterEntry> {
        self.inner.append_dead_letter(entry).await
    }

    async fn record_dead_letter_attempt(
        &self,
        tenant_id: Uuid,
        id: i64,
    ) -> StoreResult<DeadLetterEntry> {
        self.inner.record_dead_letter_attempt(tenant_id, id).await
    }

    async fn resolve_dead_letter(&self, tenant_id: Uuid, id: i64) -> StoreResult<DeadLetterEntry> {
        self.inner.resolve_dead_letter(tenant_id, id).await
    }

    async fn list_pending_dead_letters(
        &self,
        tenant_id: Uuid,
    ) -> StoreResult<Vec<DeadLetterEntry>> {
        self.inner.list_pending_dead_letters(tenant_id).await
    }
}
