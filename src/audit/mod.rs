//! Audit trail and dead-letter capture.
//!
//! Audit writes are best-effort: a failed append is logged and swallowed so
//! bookkeeping never blocks the pipeline that triggered it. Dead letters
//! capture payloads that failed processing, with retry bookkeeping so an
//! operator or replay job can drain the queue.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{AuditLogEntry, DeadLetterEntry, NewAuditLogEntry, NewDeadLetterEntry};
use crate::storage::{FulfillmentStore, StoreResult};

/// Audit event type labels
pub mod event_types {
    pub const ORDER_TRANSITION: &str = "order_transition";
    pub const SHIPMENT_INGEST: &str = "shipment_ingest";
    pub const MAPPING_CHANGE: &str = "mapping_change";
    pub const SLA_SWEEP: &str = "sla_sweep";
}

/// Audit entity type labels
pub mod entity_types {
    pub const ORDER: &str = "order";
    pub const SHIPMENT_EVENT: &str = "shipment_event";
    pub const MAPPING_RULE: &str = "mapping_rule";
    pub const STATION_METRICS: &str = "station_metrics";
    pub const DEAD_LETTER: &str = "dead_letter";
}

/// Audit action labels
pub mod actions {
    pub const TRANSITIONED: &str = "transitioned";
    pub const REOPENED: &str = "reopened";
    pub const CREATED: &str = "created";
    pub const DUPLICATE_SKIPPED: &str = "duplicate_skipped";
    pub const UNRESOLVED_MAPPING: &str = "unresolved_mapping";
    pub const UNROUTABLE: &str = "unroutable";
    pub const ANOMALY_REJECTED: &str = "anomaly_rejected";
    pub const RULE_UPSERTED: &str = "rule_upserted";
    pub const RULE_REMOVED: &str = "rule_removed";
    pub const BREACH_FLAGGED: &str = "breach_flagged";
    pub const FAILED: &str = "failed";
    pub const REPLAYED: &str = "replayed";
}

/// Best-effort writer for the tenant audit trail
#[derive(Debug)]
pub struct AuditLogger<S> {
    store: Arc<S>,
}

impl<S: FulfillmentStore> AuditLogger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append an entry, returning its id when the write lands.
    ///
    /// Failures are logged and swallowed. Callers that need the id for a
    /// response attach it when present and proceed without it otherwise.
    pub async fn record(&self, entry: NewAuditLogEntry) -> Option<i64> {
        let event_type = entry.event_type.clone();
        match self.store.append_audit_log(entry).await {
            Ok(row) => Some(row.id),
            Err(e) => {
                tracing::warn!(
                    event_type = %event_type,
                    error = %e,
                    "audit append failed, continuing without audit row"
                );
                None
            }
        }
    }

    /// Most recent entries for a tenant, optionally narrowed by entity type
    pub async fn recent(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        self.store.list_audit_logs(tenant_id, entity_type, limit).await
    }
}

impl<S> Clone for AuditLogger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Capture and replay bookkeeping for payloads that failed processing
#[derive(Debug)]
pub struct DeadLetterQueue<S> {
    store: Arc<S>,
}

impl<S: FulfillmentStore> DeadLetterQueue<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Capture a failed payload; a capture failure is logged and swallowed
    /// since the original error is already on its way back to the caller.
    pub async fn capture(&self, entry: NewDeadLetterEntry) -> Option<DeadLetterEntry> {
        let workflow = entry.workflow.clone();
        match self.store.append_dead_letter(entry).await {
            Ok(row) => {
                tracing::warn!(
                    workflow = %workflow,
                    dead_letter_id = row.id,
                    "payload captured to dead letter queue"
                );
                Some(row)
            }
            Err(e) => {
                tracing::error!(
                    workflow = %workflow,
                    error = %e,
                    "dead letter capture failed, payload is lost from the queue"
                );
                None
            }
        }
    }

    /// Bump the retry counter before a replay attempt
    pub async fn record_attempt(&self, tenant_id: Uuid, id: i64) -> StoreResult<DeadLetterEntry> {
        self.store.record_dead_letter_attempt(tenant_id, id).await
    }

    /// Mark an entry resolved so it leaves the pending queue
    pub async fn resolve(&self, tenant_id: Uuid, id: i64) -> StoreResult<DeadLetterEntry> {
        self.store.resolve_dead_letter(tenant_id, id).await
    }

    /// Unresolved entries for a tenant, oldest first
    pub async fn pending(&self, tenant_id: Uuid) -> StoreResult<Vec<DeadLetterEntry>> {
        self.store.list_pending_dead_letters(tenant_id).await
    }
}

impl<S> Clone for DeadLetterQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}
