use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// AuditLogEntry records one ingestion or transition decision.
/// Maps to `fulfillment_audit_logs` table.
///
/// Every decision the pipeline makes lands here, including rejections and
/// skipped duplicates, so operators can reconstruct why an order looks the
/// way it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub tenant_id: Uuid,
    /// Workflow family, e.g. `shipment_ingest` or `order_transition`
    pub event_type: String,
    /// Kind of entity acted on, e.g. `shipment_event` or `order`
    pub entity_type: String,
    /// Identifier of the entity, stringified for heterogeneous id types
    pub entity_id: String,
    /// What happened, e.g. `created`, `duplicate_skipped`, `anomaly_rejected`
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// New AuditLogEntry for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditLogEntry {
    pub tenant_id: Uuid,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub details: serde_json::Value,
}

impl NewAuditLogEntry {
    pub fn new(
        tenant_id: Uuid,
        event_type: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            tenant_id,
            event_type: event_type.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            details,
        }
    }
}
