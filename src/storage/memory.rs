//! In-memory storage backend.
//!
//! Backs tests and single-process deployments. Mutations that must be
//! atomic (transition appends with their station bookkeeping) serialize on a
//! per-order lock; everything else rides on `DashMap` shard locking.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{EventInsert, FulfillmentStore, StationChange, StoreError, StoreResult};
use crate::models::{
    AuditLogEntry, CourierBucketUpdate, CourierPerformanceDaily, DeadLetterEntry,
    NewAuditLogEntry, NewDeadLetterEntry, NewOrderTransition, NewShipmentEvent, OrderTransition,
    ShipmentEvent, StationMetricsRow,
};
use crate::state_machine::{OrderState, Station};

/// DashMap-backed store with tenant-scoped keys throughout
pub struct InMemoryStore {
    next_id: AtomicI64,
    events: DashMap<(Uuid, i64), ShipmentEvent>,
    event_keys: DashMap<(Uuid, String), i64>,
    orders: DashMap<(Uuid, String), i64>,
    transitions: DashMap<(Uuid, i64), Vec<OrderTransition>>,
    station_rows: DashMap<(Uuid, i64), Vec<StationMetricsRow>>,
    courier_buckets: DashMap<(Uuid, String, String, NaiveDate), CourierPerformanceDaily>,
    audit_logs: DashMap<Uuid, Vec<AuditLogEntry>>,
    dead_letters: DashMap<(Uuid, i64), DeadLetterEntry>,
    order_locks: DashMap<(Uuid, i64), Arc<Mutex<()>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            events: DashMap::new(),
            event_keys: DashMap::new(),
            orders: DashMap::new(),
            transitions: DashMap::new(),
            station_rows: DashMap::new(),
            courier_buckets: DashMap::new(),
            audit_logs: DashMap::new(),
            dead_letters: DashMap::new(),
            order_locks: DashMap::new(),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn order_lock(&self, tenant_id: Uuid, order_id: i64) -> Arc<Mutex<()>> {
        self.order_locks
            .entry((tenant_id, order_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FulfillmentStore for InMemoryStore {
    async fn insert_shipment_event(&self, event: NewShipmentEvent) -> StoreResult<EventInsert> {
        let key = (event.tenant_id, event.idempotency_key.clone());

        match self.event_keys.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                let event_id = *existing.get();
                let existing_event = self
                    .events
                    .get(&(event.tenant_id, event_id))
                    .map(|entry| entry.clone())
                    .ok_or_else(|| {
                        StoreError::Backend(format!(
                            "idempotency key indexed missing event {event_id}"
                        ))
                    })?;
                Ok(EventInsert::Duplicate(existing_event))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let id = self.allocate_id();
                let stored = ShipmentEvent {
                    id,
                    tenant_id: event.tenant_id,
                    idempotency_key: event.idempotency_key,
                    tracking_number: event.tracking_number,
                    provider: event.provider,
                    provider_status: event.provider_status,
                    internal_status: event.internal_status,
                    mode: event.mode,
                    location: event.location,
                    description: event.description,
                    is_primary: event.is_primary,
                    payload: event.payload,
                    occurred_at: event.occurred_at,
                    recorded_at: Utc::now(),
                };
                self.events.insert((stored.tenant_id, id), stored.clone());
                vacant.insert(id);
                Ok(EventInsert::Inserted(stored))
            }
        }
    }

    async fn set_event_internal_status(
        &self,
        tenant_id: Uuid,
        event_id: i64,
        status: OrderState,
    ) -> StoreResult<()> {
        let mut event = self
            .events
            .get_mut(&(tenant_id, event_id))
            .ok_or_else(|| StoreError::NotFound(format!("shipment event {event_id}")))?;
        event.internal_status = Some(status);
        Ok(())
    }

    async fn list_shipment_events(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Vec<ShipmentEvent>> {
        let mut events: Vec<ShipmentEvent> = self
            .events
            .iter()
            .filter(|entry| {
                entry.key().0 == tenant_id
                    && entry.value().tracking_number.as_deref() == Some(tracking_number)
            })
            .map(|entry| entry.value().clone())
            .collect();
        events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn resolve_order_id(&self, tenant_id: Uuid, tracking_number: &str) -> StoreResult<i64> {
        let id = *self
            .orders
            .entry((tenant_id, tracking_number.to_string()))
            .or_insert_with(|| self.allocate_id());
        Ok(id)
    }

    async fn find_order_id(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Option<i64>> {
        Ok(self
            .orders
            .get(&(tenant_id, tracking_number.to_string()))
            .map(|entry| *entry.value()))
    }

    async fn current_order_state(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<OrderState>> {
        Ok(self
            .transitions
            .get(&(tenant_id, order_id))
            .and_then(|log| log.iter().find(|t| t.most_recent).map(|t| t.to_state)))
    }

    async fn append_order_transition(
        &self,
        new_transition: NewOrderTransition,
        station_change: StationChange,
    ) -> StoreResult<OrderTransition> {
        let tenant_id = new_transition.tenant_id;
        let order_id = new_transition.order_id;
        let lock = self.order_lock(tenant_id, order_id);
        let _guard = lock.lock();

        let mut log = self
            .transitions
            .entry((tenant_id, order_id))
            .or_default();

        let sort_key = log.iter().map(|t| t.sort_key).max().unwrap_or(0) + 1;
        for previous in log.iter_mut() {
            previous.most_recent = false;
        }

        let transition = OrderTransition {
            id: self.allocate_id(),
            tenant_id,
            order_id,
            to_state: new_transition.to_state,
            from_state: new_transition.from_state,
            station: new_transition.target_station(),
            triggered_by: new_transition.triggered_by,
            source_event_id: new_transition.source_event_id,
            metadata: new_transition.metadata,
            sort_key,
            most_recent: true,
            occurred_at: new_transition.occurred_at,
            created_at: Utc::now(),
        };
        log.push(transition.clone());
        drop(log);

        let mut rows = self
            .station_rows
            .entry((tenant_id, order_id))
            .or_default();
        if station_change.exit_current {
            if let Some(open) = rows.iter_mut().find(|row| row.is_open()) {
                open.exited_at = Some(transition.occurred_at);
            }
        }
        if let Some(enter) = station_change.enter {
            let row = StationMetricsRow {
                id: self.allocate_id(),
                tenant_id: enter.tenant_id,
                order_id: enter.order_id,
                station: enter.station,
                state_at_entry: enter.state_at_entry,
                entered_at: enter.entered_at,
                exited_at: None,
                sla_target_minutes: enter.sla_target_minutes,
            };
            rows.push(row);
        }

        Ok(transition)
    }

    async fn list_order_transitions(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Vec<OrderTransition>> {
        let mut log = self
            .transitions
            .get(&(tenant_id, order_id))
            .map(|entry| entry.clone())
            .unwrap_or_default();
        log.sort_by_key(|t| t.sort_key);
        Ok(log)
    }

    async fn open_station_row(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<StationMetricsRow>> {
        Ok(self
            .station_rows
            .get(&(tenant_id, order_id))
            .and_then(|rows| rows.iter().find(|row| row.is_open()).cloned()))
    }

    async fn list_station_rows(
        &self,
        tenant_id: Uuid,
        station: Option<Station>,
        open_only: bool,
    ) -> StoreResult<Vec<StationMetricsRow>> {
        let mut rows: Vec<StationMetricsRow> = self
            .station_rows
            .iter()
            .filter(|entry| entry.key().0 == tenant_id)
            .flat_map(|entry| entry.value().clone())
            .filter(|row| station.is_none_or(|s| row.station == s))
            .filter(|row| !open_only || row.is_open())
            .collect();
        rows.sort_by(|a, b| a.entered_at.cmp(&b.entered_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn apply_courier_update(
        &self,
        update: CourierBucketUpdate,
    ) -> StoreResult<CourierPerformanceDaily> {
        let key = (
            update.tenant_id,
            update.courier.clone(),
            update.region.clone(),
            update.date,
        );
        let mut bucket = self.courier_buckets.entry(key).or_insert_with(|| {
            let mut fresh = CourierPerformanceDaily::empty(
                update.tenant_id,
                &update.courier,
                &update.region,
                update.date,
            );
            fresh.id = self.allocate_id();
            fresh
        });
        bucket.apply(&update);
        Ok(bucket.clone())
    }

    async fn list_courier_performance(
        &self,
        tenant_id: Uuid,
        courier: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<CourierPerformanceDaily>> {
        let mut buckets: Vec<CourierPerformanceDaily> = self
            .courier_buckets
            .iter()
            .filter(|entry| {
                let (bucket_tenant, bucket_courier, _region, date) = entry.key();
                *bucket_tenant == tenant_id
                    && *date >= from
                    && *date <= to
                    && courier.is_none_or(|c| bucket_courier == c)
            })
            .map(|entry| entry.value().clone())
            .collect();
        buckets.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.courier.cmp(&b.courier))
                .then_with(|| a.region.cmp(&b.region))
        });
        Ok(buckets)
    }

    async fn append_audit_log(&self, entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry> {
        let stored = AuditLogEntry {
            id: self.allocate_id(),
            tenant_id: entry.tenant_id,
            event_type: entry.event_type,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            action: entry.action,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.audit_logs
            .entry(stored.tenant_id)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn list_audit_logs(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        Ok(self
            .audit_logs
            .get(&tenant_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .filter(|e| entity_type.is_none_or(|t| e.entity_type == t))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_dead_letter(&self, entry: NewDeadLetterEntry) -> StoreResult<DeadLetterEntry> {
        let stored = DeadLetterEntry {
            id: self.allocate_id(),
            tenant_id: entry.tenant_id,
            workflow: entry.workflow,
            payload: entry.payload,
            error_class: entry.error_class,
            error_message: entry.error_message,
            retry_count: 0,
            max_retries: entry.max_retries,
            resolved: false,
            created_at: Utc::now(),
            last_attempt_at: None,
        };
        self.dead_letters
            .insert((stored.tenant_id, stored.id), stored.clone());
        Ok(stored)
    }

    async fn record_dead_letter_attempt(
        &self,
        tenant_id: Uuid,
        id: i64,
    ) -> StoreResult<DeadLetterEntry> {
        let mut entry = self
            .dead_letters
            .get_mut(&(tenant_id, id))
            .ok_or_else(|| StoreError::NotFound(format!("dead letter {id}")))?;
        entry.retry_count += 1;
        entry.last_attempt_at = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn resolve_dead_letter(&self, tenant_id: Uuid, id: i64) -> StoreResult<DeadLetterEntry> {
        let mut entry = self
            .dead_letters
            .get_mut(&(tenant_id, id))
            .ok_or_else(|| StoreError::NotFound(format!("dead letter {id}")))?;
        entry.resolved = true;
        Ok(entry.clone())
    }

    async fn list_pending_dead_letters(
        &self,
        tenant_id: Uuid,
    ) -> StoreResult<Vec<DeadLetterEntry>> {
        let mut pending: Vec<DeadLetterEntry> = self
            .dead_letters
            .iter()
            .filter(|entry| entry.key().0 == tenant_id && !entry.value().resolved)
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }
}
