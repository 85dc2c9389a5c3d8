//! # Storage Backends
//!
//! Persistence seam for the fulfillment engine. The engine talks to a
//! [`FulfillmentStore`]; `InMemoryStore` backs tests and single-process
//! deployments while `PostgresStore` (behind the default `postgres` feature)
//! backs production.
//!
//! Append operations carry their bookkeeping with them: a transition append
//! atomically closes and opens station rows, and shipment event inserts
//! enforce idempotency keys, so no backend can half-apply a decision.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AuditLogEntry, CourierBucketUpdate, CourierPerformanceDaily, DeadLetterEntry,
    NewAuditLogEntry, NewDeadLetterEntry, NewOrderTransition, NewShipmentEvent,
    NewStationMetricsRow, OrderTransition, ShipmentEvent, StationMetricsRow,
};
use crate::state_machine::{OrderState, Station};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Errors surfaced by storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend failure: {0}")]
    Backend(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization failure: {0}")]
    Serialization(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound(error.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of an idempotency-guarded shipment event insert
#[derive(Debug, Clone)]
pub enum EventInsert {
    /// Fresh event persisted
    Inserted(ShipmentEvent),
    /// Key already present; the existing row is returned untouched
    Duplicate(ShipmentEvent),
}

impl EventInsert {
    pub fn event(&self) -> &ShipmentEvent {
        match self {
            Self::Inserted(event) | Self::Duplicate(event) => event,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Station bookkeeping that rides along with a transition append
#[derive(Debug, Clone)]
pub struct StationChange {
    /// Close the currently open row, stamping the transition's occurred_at
    pub exit_current: bool,
    /// Open a fresh row for the station being entered
    pub enter: Option<NewStationMetricsRow>,
}

impl StationChange {
    /// No station movement; the order stays where it is
    pub fn none() -> Self {
        Self {
            exit_current: false,
            enter: None,
        }
    }
}

/// Persistence operations required by the fulfillment engine.
///
/// All reads and writes are tenant-scoped; implementations must never let
/// one tenant observe another's rows.
#[async_trait]
pub trait FulfillmentStore: Send + Sync + 'static {
    // ---- shipment events ----

    /// Insert a shipment event unless its idempotency key already exists
    async fn insert_shipment_event(&self, event: NewShipmentEvent) -> StoreResult<EventInsert>;

    /// Stamp the internal status an event resolved to
    async fn set_event_internal_status(
        &self,
        tenant_id: Uuid,
        event_id: i64,
        status: OrderState,
    ) -> StoreResult<()>;

    /// All events recorded for a tracking number, oldest first
    async fn list_shipment_events(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Vec<ShipmentEvent>>;

    // ---- order identity ----

    /// Order id for a tracking number, creating the association lazily
    async fn resolve_order_id(&self, tenant_id: Uuid, tracking_number: &str) -> StoreResult<i64>;

    /// Order id for a tracking number if one has been seen
    async fn find_order_id(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Option<i64>>;

    // ---- order transitions ----

    /// Current state from the most recent transition, None before the first
    async fn current_order_state(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<OrderState>>;

    /// Append a transition and settle station rows as one atomic unit
    async fn append_order_transition(
        &self,
        new_transition: NewOrderTransition,
        station_change: StationChange,
    ) -> StoreResult<OrderTransition>;

    /// Full transition history in sort_key order
    async fn list_order_transitions(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Vec<OrderTransition>>;

    // ---- station metrics ----

    /// The order's open station row, if it is on the floor anywhere
    async fn open_station_row(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<StationMetricsRow>>;

    /// Station rows, optionally filtered by station and open-only
    async fn list_station_rows(
        &self,
        tenant_id: Uuid,
        station: Option<Station>,
        open_only: bool,
    ) -> StoreResult<Vec<StationMetricsRow>>;

    // ---- courier analytics ----

    /// Fold an update into its (courier, region, date) daily bucket
    async fn apply_courier_update(
        &self,
        update: CourierBucketUpdate,
    ) -> StoreResult<CourierPerformanceDaily>;

    /// Daily buckets in a date range, optionally for one courier
    async fn list_courier_performance(
        &self,
        tenant_id: Uuid,
        courier: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<CourierPerformanceDaily>>;

    // ---- audit log ----

    async fn append_audit_log(&self, entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry>;

    /// Recent audit entries, newest first
    async fn list_audit_logs(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>>;

    // ---- dead letters ----

    async fn append_dead_letter(&self, entry: NewDeadLetterEntry) -> StoreResult<DeadLetterEntry>;

    /// Bump the retry counter and stamp the attempt time
    async fn record_dead_letter_attempt(
        &self,
        tenant_id: Uuid,
        id: i64,
    ) -> StoreResult<DeadLetterEntry>;

    /// Mark an entry resolved so it leaves the replay queue
    async fn resolve_dead_letter(&self, tenant_id: Uuid, id: i64) -> StoreResult<DeadLetterEntry>;

    /// Unresolved entries, oldest first
    async fn list_pending_dead_letters(&self, tenant_id: Uuid)
        -> StoreResult<Vec<DeadLetterEntry>>;
}
