use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::OrderState;

/// Channel a shipment event arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionMode {
    /// Carrier webhook with a structured JSON body
    Api,
    /// Bulk CSV upload from a carrier portal export
    Csv,
    /// Carrier notification email body
    Email,
    /// Operator-entered event from the operations UI
    Manual,
}

impl IngestionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Csv => "csv",
            Self::Email => "email",
            Self::Manual => "manual",
        }
    }

    /// Workflow name used when deriving idempotency keys for this channel
    pub fn workflow_name(&self) -> &'static str {
        match self {
            Self::Api => "shipment_ingest_api",
            Self::Csv => "shipment_ingest_csv",
            Self::Email => "shipment_ingest_email",
            Self::Manual => "shipment_ingest_manual",
        }
    }
}

impl fmt::Display for IngestionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IngestionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Self::Api),
            "csv" => Ok(Self::Csv),
            "email" => Ok(Self::Email),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Invalid ingestion mode: {s}")),
        }
    }
}

/// ShipmentEvent is one carrier observation about a package.
/// Maps to `fulfillment_shipment_events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub id: i64,
    pub tenant_id: Uuid,
    pub idempotency_key: String,
    /// Carrier tracking reference; absent when an email yields no match
    pub tracking_number: Option<String>,
    pub provider: Option<String>,
    pub provider_status: Option<String>,
    /// Internal state the event resolved to; None while mapping is unresolved
    pub internal_status: Option<OrderState>,
    pub mode: IngestionMode,
    pub location: Option<String>,
    pub description: Option<String>,
    /// First tracking reference found in a multi-reference email
    pub is_primary: bool,
    /// Normalized source payload kept for triage and replay analysis
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// New ShipmentEvent for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShipmentEvent {
    pub tenant_id: Uuid,
    pub idempotency_key: String,
    pub tracking_number: Option<String>,
    pub provider: Option<String>,
    pub provider_status: Option<String>,
    pub internal_status: Option<OrderState>,
    pub mode: IngestionMode,
    pub location: Option<String>,
    pub description: Option<String>,
    pub is_primary: bool,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl ShipmentEvent {
    /// Whether the event can be attached to an order at all
    pub fn is_routable(&self) -> bool {
        self.tracking_number
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_event(tracking: Option<&str>) -> ShipmentEvent {
        ShipmentEvent {
            id: 1,
            tenant_id: Uuid::new_v4(),
            idempotency_key: "shipment_ingest_api:t:abc".to_string(),
            tracking_number: tracking.map(String::from),
            provider: Some("aramex".to_string()),
            provider_status: Some("SHIPMENT DELIVERED".to_string()),
            internal_status: None,
            mode: IngestionMode::Api,
            location: None,
            description: None,
            is_primary: true,
            payload: json!({}),
            occurred_at: Utc::now(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_mode_string_conversion() {
        assert_eq!(IngestionMode::Email.to_string(), "email");
        assert_eq!("csv".parse::<IngestionMode>().unwrap(), IngestionMode::Csv);
        assert!("fax".parse::<IngestionMode>().is_err());
    }

    #[test]
    fn test_mode_workflow_names_are_distinct() {
        let modes = [
            IngestionMode::Api,
            IngestionMode::Csv,
            IngestionMode::Email,
            IngestionMode::Manual,
        ];
        for a in modes {
            for b in modes {
                if a != b {
                    assert_ne!(a.workflow_name(), b.workflow_name());
                }
            }
        }
    }

    #[test]
    fn test_routability() {
        assert!(sample_event(Some("AWB123")).is_routable());
        assert!(!sample_event(None).is_routable());
        assert!(!sample_event(Some("")).is_routable());
    }

    #[test]
    fn test_mode_serde() {
        let json = serde_json::to_string(&IngestionMode::Manual).unwrap();
        assert_eq!(json, "\"manual\"");
    }
}
