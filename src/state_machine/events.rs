use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::states::OrderState;
use crate::models::TriggeredBy;

/// Request to move an order into a target state.
///
/// The pipeline builds one of these from a resolved shipment event; operator
/// flows build them directly with `TriggeredBy::User`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub tenant_id: Uuid,
    pub order_id: i64,
    pub target_state: OrderState,
    pub triggered_by: TriggeredBy,
    /// Shipment event that produced the request, when one did
    pub source_event_id: Option<i64>,
    /// When the underlying change happened in the real world
    pub occurred_at: DateTime<Utc>,
    /// Free-form context carried into the transition row
    pub metadata: Value,
}

impl TransitionRequest {
    /// Build a system-triggered request from a resolved shipment event
    pub fn from_event(
        tenant_id: Uuid,
        order_id: i64,
        target_state: OrderState,
        source_event_id: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            order_id,
            target_state,
            triggered_by: TriggeredBy::System,
            source_event_id: Some(source_event_id),
            occurred_at,
            metadata: Value::Null,
        }
    }

    /// Build an operator-triggered request
    pub fn manual(
        tenant_id: Uuid,
        order_id: i64,
        target_state: OrderState,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            order_id,
            target_state,
            triggered_by: TriggeredBy::User,
            source_event_id: None,
            occurred_at,
            metadata: Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Override the trigger attribution, for event-sourced requests that
    /// originate with an operator rather than a carrier feed
    pub fn with_trigger(mut self, triggered_by: TriggeredBy) -> Self {
        self.triggered_by = triggered_by;
        self
    }

    /// Check if this request lands the order in a terminal state
    pub fn is_terminal_target(&self) -> bool {
        self.target_state.is_terminal()
    }
}
