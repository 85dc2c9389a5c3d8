//! PostgreSQL storage backend.
//!
//! Queries bind at runtime so the crate builds without a live database.
//! `ensure_schema` creates the tables idempotently; production deployments
//! that manage schema elsewhere can skip it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{EventInsert, FulfillmentStore, StationChange, StoreError, StoreResult};
use crate::models::{
    AuditLogEntry, CourierBucketUpdate, CourierPerformanceDaily, DeadLetterEntry,
    NewAuditLogEntry, NewDeadLetterEntry, NewOrderTransition, NewShipmentEvent, OrderTransition,
    ShipmentEvent, StationMetricsRow,
};
use crate::state_machine::{OrderState, Station};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS fulfillment_shipment_events (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    idempotency_key TEXT NOT NULL,
    tracking_number TEXT,
    provider TEXT,
    provider_status TEXT,
    internal_status TEXT,
    mode TEXT NOT NULL,
    location TEXT,
    description TEXT,
    is_primary BOOLEAN NOT NULL DEFAULT TRUE,
    payload JSONB NOT NULL DEFAULT '{}'::jsonb,
    occurred_at TIMESTAMPTZ NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (tenant_id, idempotency_key)
);
CREATE INDEX IF NOT EXISTS idx_shipment_events_tracking
    ON fulfillment_shipment_events (tenant_id, tracking_number);

CREATE TABLE IF NOT EXISTS fulfillment_orders (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    tracking_number TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (tenant_id, tracking_number)
);

CREATE TABLE IF NOT EXISTS fulfillment_order_transitions (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    order_id BIGINT NOT NULL,
    to_state TEXT NOT NULL,
    from_state TEXT,
    station TEXT NOT NULL,
    triggered_by TEXT NOT NULL,
    source_event_id BIGINT,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    sort_key INT NOT NULL,
    most_recent BOOLEAN NOT NULL DEFAULT TRUE,
    occurred_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (tenant_id, order_id, sort_key)
);
CREATE INDEX IF NOT EXISTS idx_order_transitions_current
    ON fulfillment_order_transitions (tenant_id, order_id)
    WHERE most_recent;

CREATE TABLE IF NOT EXISTS fulfillment_station_metrics (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    order_id BIGINT NOT NULL,
    station TEXT NOT NULL,
    state_at_entry TEXT NOT NULL,
    entered_at TIMESTAMPTZ NOT NULL,
    exited_at TIMESTAMPTZ,
    sla_target_minutes BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_station_metrics_open
    ON fulfillment_station_metrics (tenant_id, order_id)
    WHERE exited_at IS NULL;

CREATE TABLE IF NOT EXISTS fulfillment_courier_performance_daily (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    courier TEXT NOT NULL,
    region TEXT NOT NULL,
    date DATE NOT NULL,
    total_count INT NOT NULL DEFAULT 0,
    delivered_count INT NOT NULL DEFAULT 0,
    returned_count INT NOT NULL DEFAULT 0,
    on_time_count INT NOT NULL DEFAULT 0,
    pickup_hours_total DOUBLE PRECISION NOT NULL DEFAULT 0,
    pickup_count INT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (tenant_id, courier, region, date)
);

CREATE TABLE IF NOT EXISTS fulfillment_audit_logs (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    event_type TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    action TEXT NOT NULL,
    details JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_tenant
    ON fulfillment_audit_logs (tenant_id, created_at DESC);

CREATE TABLE IF NOT EXISTS fulfillment_dead_letters (
    id BIGSERIAL PRIMARY KEY,
    tenant_id UUID NOT NULL,
    workflow TEXT NOT NULL,
    payload JSONB NOT NULL DEFAULT '{}'::jsonb,
    error_class TEXT NOT NULL,
    error_message TEXT NOT NULL,
    retry_count INT NOT NULL DEFAULT 0,
    max_retries INT NOT NULL DEFAULT 3,
    resolved BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_attempt_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_dead_letters_pending
    ON fulfillment_dead_letters (tenant_id, created_at)
    WHERE NOT resolved;
"#;

/// PgPool-backed store; cheap to clone
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and return a store over a fresh pool
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Create the fulfillment tables if they do not exist
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// Row mirrors keep state columns as TEXT and parse at the boundary, the
// same discipline applied to every state read in the transition log.

#[derive(Debug, FromRow)]
struct ShipmentEventRow {
    id: i64,
    tenant_id: Uuid,
    idempotency_key: String,
    tracking_number: Option<String>,
    provider: Option<String>,
    provider_status: Option<String>,
    internal_status: Option<String>,
    mode: String,
    location: Option<String>,
    description: Option<String>,
    is_primary: bool,
    payload: serde_json::Value,
    occurred_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<ShipmentEventRow> for ShipmentEvent {
    type Error = StoreError;

    fn try_from(row: ShipmentEventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            idempotency_key: row.idempotency_key,
            tracking_number: row.tracking_number,
            provider: row.provider,
            provider_status: row.provider_status,
            internal_status: row
                .internal_status
                .as_deref()
                .map(parse_state)
                .transpose()?,
            mode: row
                .mode
                .parse()
                .map_err(|e: String| StoreError::Serialization(e))?,
            location: row.location,
            description: row.description,
            is_primary: row.is_primary,
            payload: row.payload,
            occurred_at: row.occurred_at,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderTransitionRow {
    id: i64,
    tenant_id: Uuid,
    order_id: i64,
    to_state: String,
    from_state: Option<String>,
    station: String,
    triggered_by: String,
    source_event_id: Option<i64>,
    metadata: serde_json::Value,
    sort_key: i32,
    most_recent: bool,
    occurred_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderTransitionRow> for OrderTransition {
    type Error = StoreError;

    fn try_from(row: OrderTransitionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            order_id: row.order_id,
            to_state: parse_state(&row.to_state)?,
            from_state: row.from_state.as_deref().map(parse_state).transpose()?,
            station: parse_station(&row.station)?,
            triggered_by: row
                .triggered_by
                .parse()
                .map_err(|e: String| StoreError::Serialization(e))?,
            source_event_id: row.source_event_id,
            metadata: row.metadata,
            sort_key: row.sort_key,
            most_recent: row.most_recent,
            occurred_at: row.occurred_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StationRow {
    id: i64,
    tenant_id: Uuid,
    order_id: i64,
    station: String,
    state_at_entry: String,
    entered_at: DateTime<Utc>,
    exited_at: Option<DateTime<Utc>>,
    sla_target_minutes: i64,
}

impl TryFrom<StationRow> for StationMetricsRow {
    type Error = StoreError;

    fn try_from(row: StationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            order_id: row.order_id,
            station: parse_station(&row.station)?,
            state_at_entry: parse_state(&row.state_at_entry)?,
            entered_at: row.entered_at,
            exited_at: row.exited_at,
            sla_target_minutes: row.sla_target_minutes,
        })
    }
}

#[derive(Debug, FromRow)]
struct CourierRow {
    id: i64,
    tenant_id: Uuid,
    courier: String,
    region: String,
    date: NaiveDate,
    total_count: i32,
    delivered_count: i32,
    returned_count: i32,
    on_time_count: i32,
    pickup_hours_total: f64,
    pickup_count: i32,
    updated_at: DateTime<Utc>,
}

impl From<CourierRow> for CourierPerformanceDaily {
    fn from(row: CourierRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            courier: row.courier,
            region: row.region,
            date: row.date,
            total_count: row.total_count,
            delivered_count: row.delivered_count,
            returned_count: row.returned_count,
            on_time_count: row.on_time_count,
            pickup_hours_total: row.pickup_hours_total,
            pickup_count: row.pickup_count,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: i64,
    tenant_id: Uuid,
    event_type: String,
    entity_type: String,
    entity_id: String,
    action: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditLogEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            event_type: row.event_type,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DeadLetterRow {
    id: i64,
    tenant_id: Uuid,
    workflow: String,
    payload: serde_json::Value,
    error_class: String,
    error_message: String,
    retry_count: i32,
    max_retries: i32,
    resolved: bool,
    created_at: DateTime<Utc>,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl From<DeadLetterRow> for DeadLetterEntry {
    fn from(row: DeadLetterRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            workflow: row.workflow,
            payload: row.payload,
            error_class: row.error_class,
            error_message: row.error_message,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            resolved: row.resolved,
            created_at: row.created_at,
            last_attempt_at: row.last_attempt_at,
        }
    }
}

fn parse_state(value: &str) -> Result<OrderState, StoreError> {
    value.parse().map_err(|e: String| StoreError::Serialization(e))
}

fn parse_station(value: &str) -> Result<Station, StoreError> {
    value.parse().map_err(|e: String| StoreError::Serialization(e))
}

#[async_trait]
impl FulfillmentStore for PostgresStore {
    async fn insert_shipment_event(&self, event: NewShipmentEvent) -> StoreResult<EventInsert> {
        let inserted = sqlx::query_as::<_, ShipmentEventRow>(
            r#"
            INSERT INTO fulfillment_shipment_events
                (tenant_id, idempotency_key, tracking_number, provider, provider_status,
                 internal_status, mode, location, description, is_primary, payload, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tenant_id, idempotency_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(event.tenant_id)
        .bind(&event.idempotency_key)
        .bind(&event.tracking_number)
        .bind(&event.provider)
        .bind(&event.provider_status)
        .bind(event.internal_status.map(|s| s.to_string()))
        .bind(event.mode.to_string())
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.is_primary)
        .bind(&event.payload)
        .bind(event.occurred_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(EventInsert::Inserted(row.try_into()?));
        }

        let existing = sqlx::query_as::<_, ShipmentEventRow>(
            r#"
            SELECT * FROM fulfillment_shipment_events
            WHERE tenant_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(event.tenant_id)
        .bind(&event.idempotency_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(EventInsert::Duplicate(existing.try_into()?))
    }

    async fn set_event_internal_status(
        &self,
        tenant_id: Uuid,
        event_id: i64,
        status: OrderState,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE fulfillment_shipment_events
            SET internal_status = $3
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(event_id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("shipment event {event_id}")));
        }
        Ok(())
    }

    async fn list_shipment_events(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Vec<ShipmentEvent>> {
        let rows = sqlx::query_as::<_, ShipmentEventRow>(
            r#"
            SELECT * FROM fulfillment_shipment_events
            WHERE tenant_id = $1 AND tracking_number = $2
            ORDER BY occurred_at, id
            "#,
        )
        .bind(tenant_id)
        .bind(tracking_number)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn resolve_order_id(&self, tenant_id: Uuid, tracking_number: &str) -> StoreResult<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO fulfillment_orders (tenant_id, tracking_number)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id, tracking_number)
                DO UPDATE SET tracking_number = EXCLUDED.tracking_number
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .bind(tracking_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_order_id(
        &self,
        tenant_id: Uuid,
        tracking_number: &str,
    ) -> StoreResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM fulfillment_orders
            WHERE tenant_id = $1 AND tracking_number = $2
            "#,
        )
        .bind(tenant_id)
        .bind(tracking_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn current_order_state(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<OrderState>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT to_state FROM fulfillment_order_transitions
            WHERE tenant_id = $1 AND order_id = $2 AND most_recent = TRUE
            ORDER BY sort_key DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(state,)| parse_state(&state)).transpose()
    }

    async fn append_order_transition(
        &self,
        new_transition: NewOrderTransition,
        station_change: StationChange,
    ) -> StoreResult<OrderTransition> {
        let mut tx = self.pool.begin().await?;

        let (sort_key,): (i32,) = sqlx::query_as(
            r#"
            SELECT COALESCE(MAX(sort_key), 0) + 1
            FROM fulfillment_order_transitions
            WHERE tenant_id = $1 AND order_id = $2
            "#,
        )
        .bind(new_transition.tenant_id)
        .bind(new_transition.order_id)
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, OrderTransitionRow>(
            r#"
            INSERT INTO fulfillment_order_transitions
                (tenant_id, order_id, to_state, from_state, station, triggered_by,
                 source_event_id, metadata, sort_key, most_recent, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, $10)
            RETURNING *
            "#,
        )
        .bind(new_transition.tenant_id)
        .bind(new_transition.order_id)
        .bind(new_transition.to_state.to_string())
        .bind(new_transition.from_state.map(|s| s.to_string()))
        .bind(new_transition.target_station().to_string())
        .bind(new_transition.triggered_by.to_string())
        .bind(new_transition.source_event_id)
        .bind(&new_transition.metadata)
        .bind(sort_key)
        .bind(new_transition.occurred_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE fulfillment_order_transitions
            SET most_recent = FALSE
            WHERE tenant_id = $1 AND order_id = $2 AND id != $3
            "#,
        )
        .bind(new_transition.tenant_id)
        .bind(new_transition.order_id)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

        if station_change.exit_current {
            sqlx::query(
                r#"
                UPDATE fulfillment_station_metrics
                SET exited_at = $3
                WHERE tenant_id = $1 AND order_id = $2 AND exited_at IS NULL
                "#,
            )
            .bind(new_transition.tenant_id)
            .bind(new_transition.order_id)
            .bind(new_transition.occurred_at)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(enter) = station_change.enter {
            sqlx::query(
                r#"
                INSERT INTO fulfillment_station_metrics
                    (tenant_id, order_id, station, state_at_entry, entered_at, sla_target_minutes)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(enter.tenant_id)
            .bind(enter.order_id)
            .bind(enter.station.to_string())
            .bind(enter.state_at_entry.to_string())
            .bind(enter.entered_at)
            .bind(enter.sla_target_minutes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        row.try_into()
    }

    async fn list_order_transitions(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Vec<OrderTransition>> {
        let rows = sqlx::query_as::<_, OrderTransitionRow>(
            r#"
            SELECT * FROM fulfillment_order_transitions
            WHERE tenant_id = $1 AND order_id = $2
            ORDER BY sort_key
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn open_station_row(
        &self,
        tenant_id: Uuid,
        order_id: i64,
    ) -> StoreResult<Option<StationMetricsRow>> {
        let row = sqlx::query_as::<_, StationRow>(
            r#"
            SELECT * FROM fulfillment_station_metrics
            WHERE tenant_id = $1 AND order_id = $2 AND exited_at IS NULL
            ORDER BY entered_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_station_rows(
        &self,
        tenant_id: Uuid,
        station: Option<Station>,
        open_only: bool,
    ) -> StoreResult<Vec<StationMetricsRow>> {
        let rows = sqlx::query_as::<_, StationRow>(
            r#"
            SELECT * FROM fulfillment_station_metrics
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR station = $2)
              AND ($3 = FALSE OR exited_at IS NULL)
            ORDER BY entered_at, id
            "#,
        )
        .bind(tenant_id)
        .bind(station.map(|s| s.to_string()))
        .bind(open_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn apply_courier_update(
        &self,
        update: CourierBucketUpdate,
    ) -> StoreResult<CourierPerformanceDaily> {
        let delivered = i32::from(update.delivered);
        let returned = i32::from(update.returned);
        let total = delivered + returned;
        let on_time = i32::from(update.delivered && update.on_time);
        let pickup_hours = update.pickup_hours.unwrap_or(0.0);
        let pickup_count = i32::from(update.pickup_hours.is_some());

        let row = sqlx::query_as::<_, CourierRow>(
            r#"
            INSERT INTO fulfillment_courier_performance_daily
                (tenant_id, courier, region, date, total_count, delivered_count,
                 returned_count, on_time_count, pickup_hours_total, pickup_count, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            ON CONFLICT (tenant_id, courier, region, date) DO UPDATE SET
                total_count = fulfillment_courier_performance_daily.total_count + EXCLUDED.total_count,
                delivered_count = fulfillment_courier_performance_daily.delivered_count + EXCLUDED.delivered_count,
                returned_count = fulfillment_courier_performance_daily.returned_count + EXCLUDED.returned_count,
                on_time_count = fulfillment_courier_performance_daily.on_time_count + EXCLUDED.on_time_count,
                pickup_hours_total = fulfillment_courier_performance_daily.pickup_hours_total + EXCLUDED.pickup_hours_total,
                pickup_count = fulfillment_courier_performance_daily.pickup_count + EXCLUDED.pickup_count,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(update.tenant_id)
        .bind(&update.courier)
        .bind(&update.region)
        .bind(update.date)
        .bind(total)
        .bind(delivered)
        .bind(returned)
        .bind(on_time)
        .bind(pickup_hours)
        .bind(pickup_count)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_courier_performance(
        &self,
        tenant_id: Uuid,
        courier: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<CourierPerformanceDaily>> {
        let rows = sqlx::query_as::<_, CourierRow>(
            r#"
            SELECT * FROM fulfillment_courier_performance_daily
            WHERE tenant_id = $1
              AND date BETWEEN $2 AND $3
              AND ($4::text IS NULL OR courier = $4)
            ORDER BY date, courier, region
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .bind(courier)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn append_audit_log(&self, entry: NewAuditLogEntry) -> StoreResult<AuditLogEntry> {
        let row = sqlx::query_as::<_, AuditRow>(
            r#"
            INSERT INTO fulfillment_audit_logs
                (tenant_id, event_type, entity_type, entity_id, action, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.tenant_id)
        .bind(&entry.event_type)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.action)
        .bind(&entry.details)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_audit_logs(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT * FROM fulfillment_audit_logs
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR entity_type = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn append_dead_letter(&self, entry: NewDeadLetterEntry) -> StoreResult<DeadLetterEntry> {
        let row = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            INSERT INTO fulfillment_dead_letters
                (tenant_id, workflow, payload, error_class, error_message, max_retries)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(entry.tenant_id)
        .bind(&entry.workflow)
        .bind(&entry.payload)
        .bind(&entry.error_class)
        .bind(&entry.error_message)
        .bind(entry.max_retries)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn record_dead_letter_attempt(
        &self,
        tenant_id: Uuid,
        id: i64,
    ) -> StoreResult<DeadLetterEntry> {
        let row = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            UPDATE fulfillment_dead_letters
            SET retry_count = retry_count + 1, last_attempt_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("dead letter {id}")))?;

        Ok(row.into())
    }

    async fn resolve_dead_letter(&self, tenant_id: Uuid, id: i64) -> StoreResult<DeadLetterEntry> {
        let row = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            UPDATE fulfillment_dead_letters
            SET resolved = TRUE
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("dead letter {id}")))?;

        Ok(row.into())
    }

    async fn list_pending_dead_letters(
        &self,
        tenant_id: Uuid,
    ) -> StoreResult<Vec<DeadLetterEntry>> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT * FROM fulfillment_dead_letters
            WHERE tenant_id = $1 AND resolved = FALSE
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
