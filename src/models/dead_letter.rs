use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::system::DEFAULT_MAX_RETRIES;

/// DeadLetterEntry preserves a failed pipeline write for later replay.
/// Maps to `fulfillment_dead_letters` table.
///
/// Capture is best-effort bookkeeping around an already-failed operation;
/// entries park after `max_retries` attempts and wait for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: i64,
    pub tenant_id: Uuid,
    /// Workflow that failed, e.g. `shipment_ingest_api`
    pub workflow: String,
    /// Normalized payload as it looked when the failure happened
    pub payload: serde_json::Value,
    pub error_class: String,
    pub error_message: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// New DeadLetterEntry for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeadLetterEntry {
    pub tenant_id: Uuid,
    pub workflow: String,
    pub payload: serde_json::Value,
    pub error_class: String,
    pub error_message: String,
    pub max_retries: i32,
}

impl NewDeadLetterEntry {
    pub fn new(
        tenant_id: Uuid,
        workflow: impl Into<String>,
        payload: serde_json::Value,
        error_class: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            workflow: workflow.into(),
            payload,
            error_class: error_class.into(),
            error_message: error_message.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl DeadLetterEntry {
    /// Whether another replay attempt is allowed
    pub fn can_retry(&self) -> bool {
        !self.resolved && self.retry_count < self.max_retries
    }

    /// Whether the entry has burned through its retry budget
    pub fn is_exhausted(&self) -> bool {
        !self.resolved && self.retry_count >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(retry_count: i32, resolved: bool) -> DeadLetterEntry {
        DeadLetterEntry {
            id: 1,
            tenant_id: Uuid::new_v4(),
            workflow: "shipment_ingest_api".to_string(),
            payload: json!({"tracking_number": "AWB1"}),
            error_class: "StorageError".to_string(),
            error_message: "connection reset".to_string(),
            retry_count,
            max_retries: 3,
            resolved,
            created_at: Utc::now(),
            last_attempt_at: None,
        }
    }

    #[test]
    fn test_retry_budget() {
        assert!(entry(0, false).can_retry());
        assert!(entry(2, false).can_retry());
        assert!(!entry(3, false).can_retry());
        assert!(entry(3, false).is_exhausted());
    }

    #[test]
    fn test_resolved_entries_never_retry() {
        assert!(!entry(0, true).can_retry());
        assert!(!entry(5, true).is_exhausted());
    }

    #[test]
    fn test_new_entry_defaults_max_retries() {
        let entry = NewDeadLetterEntry::new(
            Uuid::new_v4(),
            "shipment_ingest_csv",
            json!({}),
            "StorageError",
            "disk full",
        );
        assert_eq!(entry.max_retries, DEFAULT_MAX_RETRIES);
    }
}
