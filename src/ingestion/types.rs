//! Shared types for the ingestion pipeline.
//!
//! Every channel normalizer produces [`NormalizedEvent`]s and every entry
//! point answers with an [`IngestResult`]. Entry points never return `Err`
//! to the caller; webhook senders and schedulers have no recovery path for
//! an exception, so failures travel inside the result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::models::IngestionMode;
use crate::state_machine::{OrderState, Station};

/// Canonical shipment event produced by a channel normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub tracking_number: Option<String>,
    pub provider: Option<String>,
    pub provider_status: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub mode: IngestionMode,
    /// False only for secondary tracking references found in one email
    pub is_primary: bool,
}

impl NormalizedEvent {
    /// Stable payload for idempotency key derivation.
    ///
    /// The field set is fixed; replays of the same logical event serialize
    /// to the same canonical form regardless of how the channel spelled it.
    pub fn idempotency_payload(&self) -> Value {
        json!({
            "tracking_number": self.tracking_number,
            "provider": self.provider,
            "provider_status": self.provider_status,
            "location": self.location,
            "description": self.description,
            "occurred_at": self.occurred_at.to_rfc3339(),
            "mode": self.mode.as_str(),
        })
    }
}

/// Why an ingest result was skipped, degraded, or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestReason {
    DuplicateEvent,
    NoTrackingReference,
    UnresolvedStatusMapping,
    TerminalStateAnomaly,
    InvalidPayload,
    StorageFailure,
    RetriesExhausted,
}

impl fmt::Display for IngestReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IngestReason::DuplicateEvent => "duplicate_event",
            IngestReason::NoTrackingReference => "no_tracking_reference",
            IngestReason::UnresolvedStatusMapping => "unresolved_status_mapping",
            IngestReason::TerminalStateAnomaly => "terminal_state_anomaly",
            IngestReason::InvalidPayload => "invalid_payload",
            IngestReason::StorageFailure => "storage_failure",
            IngestReason::RetriesExhausted => "retries_exhausted",
        };
        write!(f, "{label}")
    }
}

/// What the pipeline did with one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestData {
    pub event_id: i64,
    pub order_id: Option<i64>,
    pub internal_status: Option<OrderState>,
    pub station: Option<Station>,
    pub transition_id: Option<i64>,
}

/// Structured outcome of one ingestion attempt.
///
/// `skipped = true` signals an idempotent replay and is a success from the
/// caller's point of view. `reason` explains any skip, degradation, or
/// failure; `audit_log_id` points at the audit row recording the decision
/// when that write landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResult {
    pub success: bool,
    pub data: Option<IngestData>,
    pub skipped: bool,
    pub reason: Option<IngestReason>,
    pub audit_log_id: Option<i64>,
}

impl IngestResult {
    pub fn success(data: IngestData) -> Self {
        Self {
            success: true,
            data: Some(data),
            skipped: false,
            reason: None,
            audit_log_id: None,
        }
    }

    /// Success that still needs operator attention (unresolved mapping,
    /// missing tracking reference, rejected anomaly)
    pub fn success_with_reason(data: Option<IngestData>, reason: IngestReason) -> Self {
        Self {
            success: true,
            data,
            skipped: false,
            reason: Some(reason),
            audit_log_id: None,
        }
    }

    /// Idempotent replay; the data points at the original event
    pub fn duplicate(data: IngestData) -> Self {
        Self {
            success: true,
            data: Some(data),
            skipped: true,
            reason: Some(IngestReason::DuplicateEvent),
            audit_log_id: None,
        }
    }

    pub fn failure(reason: IngestReason) -> Self {
        Self {
            success: false,
            data: None,
            skipped: false,
            reason: Some(reason),
            audit_log_id: None,
        }
    }

    pub fn with_audit_log(mut self, audit_log_id: Option<i64>) -> Self {
        self.audit_log_id = audit_log_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idempotency::generate_idempotency_key;
    use uuid::Uuid;

    fn sample_event() -> NormalizedEvent {
        NormalizedEvent {
            tracking_number: Some("AWB123".to_string()),
            provider: Some("aramex".to_string()),
            provider_status: Some("delivered".to_string()),
            location: None,
            description: None,
            occurred_at: "2026-03-01T10:00:00Z".parse().unwrap(),
            mode: IngestionMode::Api,
            is_primary: true,
        }
    }

    #[test]
    fn test_idempotency_payload_is_stable() {
        let tenant = Uuid::new_v4();
        let event = sample_event();
        let key_a = generate_idempotency_key(
            event.mode.workflow_name(),
            tenant,
            &event.idempotency_payload(),
        );
        let key_b = generate_idempotency_key(
            event.mode.workflow_name(),
            tenant,
            &event.idempotency_payload(),
        );
        assert_eq!(key_a, key_b);

        let mut changed = event.clone();
        changed.provider_status = Some("in_transit".to_string());
        let key_c = generate_idempotency_key(
            changed.mode.workflow_name(),
            tenant,
            &changed.idempotency_payload(),
        );
        assert_ne!(key_a, key_c);
    }

    #[test]
    fn test_duplicate_result_is_successful_and_skipped() {
        let result = IngestResult::duplicate(IngestData {
            event_id: 7,
            order_id: Some(3),
            internal_status: None,
            station: None,
            transition_id: None,
        });
        assert!(result.success);
        assert!(result.skipped);
        assert_eq!(result.reason, Some(IngestReason::DuplicateEvent));
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&IngestReason::TerminalStateAnomaly).unwrap();
        assert_eq!(json, "\"terminal_state_anomaly\"");
        assert_eq!(IngestReason::NoTrackingReference.to_string(), "no_tracking_reference");
    }
}
