use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::{OrderState, Station};

/// Who initiated a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    /// Carrier-driven ingestion (webhook, CSV, email)
    System,
    /// Operator action (manual entry, return reopen)
    User,
    /// Host platform automation rules; this crate reads such rows but
    /// never writes them
    Automation,
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Automation => write!(f, "automation"),
        }
    }
}

impl std::str::FromStr for TriggeredBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "automation" => Ok(Self::Automation),
            _ => Err(format!("Invalid transition trigger: {s}")),
        }
    }
}

/// OrderTransition is one row of an order's append-only state history.
/// Maps to `fulfillment_order_transitions` table.
///
/// The current state of an order is the `to_state` of its `most_recent`
/// row; `sort_key` preserves total write order so history can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTransition {
    pub id: i64,
    pub tenant_id: Uuid,
    pub order_id: i64,
    pub to_state: OrderState,
    pub from_state: Option<OrderState>,
    /// Station owning the order once this transition is applied
    pub station: Station,
    pub triggered_by: TriggeredBy,
    /// Shipment event that caused this transition, when one did
    pub source_event_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub sort_key: i32,
    pub most_recent: bool,
    /// When the underlying real-world change happened
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// New OrderTransition for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderTransition {
    pub tenant_id: Uuid,
    pub order_id: i64,
    pub to_state: OrderState,
    pub from_state: Option<OrderState>,
    pub triggered_by: TriggeredBy,
    pub source_event_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl NewOrderTransition {
    /// Station the order will belong to after this transition
    pub fn target_station(&self) -> Station {
        self.to_state.station()
    }
}
