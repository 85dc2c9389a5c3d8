//! # System Constants and Definitions
//!
//! Core constants, enums, and lookup tables that define the operational
//! boundaries of the fulfillment tracking system.
//!
//! Station routing and SLA targets live here because the operations platform
//! treats them as fixed reference data rather than per-tenant configuration.

use std::collections::HashMap;

// Re-export state types for convenience
pub use crate::state_machine::{OrderState as OrderStatus, Station};

/// Core system events that announce ingestion decisions and state transitions
pub mod events {
    // Shipment event lifecycle
    pub const SHIPMENT_EVENT_RECEIVED: &str = "shipment.event_received";
    pub const SHIPMENT_EVENT_DUPLICATE: &str = "shipment.event_duplicate";
    pub const SHIPMENT_EVENT_UNROUTABLE: &str = "shipment.event_unroutable";
    pub const SHIPMENT_MAPPING_UNRESOLVED: &str = "shipment.mapping_unresolved";

    // Order lifecycle
    pub const ORDER_TRANSITIONED: &str = "order.transitioned";
    pub const ORDER_TERMINAL_REACHED: &str = "order.terminal_reached";
    pub const ORDER_REOPENED: &str = "order.reopened";
    pub const ORDER_ANOMALY_DETECTED: &str = "order.anomaly_detected";

    // Station tracking
    pub const STATION_ENTERED: &str = "station.entered";
    pub const STATION_EXITED: &str = "station.exited";
    pub const STATION_SLA_BREACHED: &str = "station.sla_breached";

    // Failure capture
    pub const DEAD_LETTER_CAPTURED: &str = "dead_letter.captured";
    pub const DEAD_LETTER_RESOLVED: &str = "dead_letter.resolved";

    // Mapping administration
    pub const MAPPING_RULE_UPSERTED: &str = "mapping.rule_upserted";
    pub const MAPPING_RULE_REMOVED: &str = "mapping.rule_removed";
}

/// System-wide constants
pub mod system {
    /// Unknown value placeholder
    pub const UNKNOWN: &str = "unknown";

    /// Provider wildcard used by the lowest mapping tier
    pub const WILDCARD_PROVIDER: &str = "*";

    /// Version compatibility marker
    pub const FULFILLMENT_CORE_VERSION: &str = "0.1.0";

    /// Maximum retry attempts before a dead letter is parked for review
    pub const DEFAULT_MAX_RETRIES: i32 = 3;

    /// Maximum rows accepted in a single CSV batch
    pub const MAX_CSV_BATCH_ROWS: usize = 10_000;
}

/// Status groupings for validation and logic
pub mod status_groups {
    use super::OrderStatus;

    /// Order statuses that freeze an order against carrier-driven updates
    pub const TERMINAL_STATES: &[OrderStatus] = &[
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::ReturnReceived,
    ];

    /// Order statuses normally produced by carrier webhook feeds
    pub const CARRIER_DRIVEN_STATES: &[OrderStatus] = &[
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::ReturnInTransit,
        OrderStatus::ReturnReceived,
    ];

    /// Order statuses that keep a shipment inside the forward flow
    pub const FORWARD_FLOW_STATES: &[OrderStatus] = &[
        OrderStatus::New,
        OrderStatus::CallCenterPending,
        OrderStatus::CallCenterConfirmed,
        OrderStatus::OperationsPending,
        OrderStatus::OperationsProcessing,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
    ];

    /// Order statuses in the reverse-logistics flow
    pub const RETURN_FLOW_STATES: &[OrderStatus] = &[
        OrderStatus::ReturnRequested,
        OrderStatus::ReturnInTransit,
        OrderStatus::ReturnReceived,
    ];
}

/// Station SLA targets in minutes
pub mod sla {
    use super::Station;

    pub const CALL_CENTER_TARGET_MINUTES: i64 = 60;
    pub const OPERATIONS_TARGET_MINUTES: i64 = 240;
    pub const FINANCE_TARGET_MINUTES: i64 = 1440;
    pub const RETURNS_TARGET_MINUTES: i64 = 2880;

    /// Default SLA target for a station, before configuration overrides
    pub fn default_target_minutes(station: Station) -> i64 {
        match station {
            Station::CallCenter => CALL_CENTER_TARGET_MINUTES,
            Station::Operations => OPERATIONS_TARGET_MINUTES,
            Station::Finance => FINANCE_TARGET_MINUTES,
            Station::Returns => RETURNS_TARGET_MINUTES,
        }
    }
}

/// State transition event mapping
pub type OrderTransitionKey = (Option<OrderStatus>, OrderStatus);
pub type OrderTransitionMap = HashMap<OrderTransitionKey, &'static str>;

/// Event name published for a given transition.
///
/// Reopening a delivered order and reaching a terminal state get dedicated
/// event names; every other transition announces the generic one.
pub fn transition_event_name(from: Option<OrderStatus>, to: OrderStatus) -> &'static str {
    match (from, to) {
        (Some(OrderStatus::Delivered), OrderStatus::ReturnRequested) => events::ORDER_REOPENED,
        (_, target) if target.is_terminal() => events::ORDER_TERMINAL_REACHED,
        _ => events::ORDER_TRANSITIONED,
    }
}

/// Build the full transition event map for consumers that index by pair
pub fn build_order_transition_map() -> OrderTransitionMap {
    let mut map = HashMap::new();

    let all_states = [
        OrderStatus::New,
        OrderStatus::CallCenterPending,
        OrderStatus::CallCenterConfirmed,
        OrderStatus::OperationsPending,
        OrderStatus::OperationsProcessing,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::FinancePending,
        OrderStatus::FinanceSettled,
        OrderStatus::ReturnRequested,
        OrderStatus::ReturnInTransit,
        OrderStatus::ReturnReceived,
    ];

    for to in all_states {
        map.insert((None, to), transition_event_name(None, to));
        for from in all_states {
            map.insert((Some(from), to), transition_event_name(Some(from), to));
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_group_matches_state_predicate() {
        for status in status_groups::TERMINAL_STATES {
            assert!(status.is_terminal());
        }
        for status in status_groups::FORWARD_FLOW_STATES {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_default_sla_targets() {
        assert_eq!(sla::default_target_minutes(Station::CallCenter), 60);
        assert_eq!(sla::default_target_minutes(Station::Operations), 240);
        assert_eq!(sla::default_target_minutes(Station::Finance), 1440);
        assert_eq!(sla::default_target_minutes(Station::Returns), 2880);
    }

    #[test]
    fn test_transition_event_names() {
        assert_eq!(
            transition_event_name(Some(OrderStatus::InTransit), OrderStatus::Delivered),
            events::ORDER_TERMINAL_REACHED
        );
        assert_eq!(
            transition_event_name(Some(OrderStatus::Delivered), OrderStatus::ReturnRequested),
            events::ORDER_REOPENED
        );
        assert_eq!(
            transition_event_name(None, OrderStatus::New),
            events::ORDER_TRANSITIONED
        );
        assert_eq!(
            transition_event_name(Some(OrderStatus::New), OrderStatus::CallCenterPending),
            events::ORDER_TRANSITIONED
        );
    }

    #[test]
    fn test_transition_map_covers_initial_transitions() {
        let map = build_order_transition_map();
        assert_eq!(
            map.get(&(None, OrderStatus::New)),
            Some(&events::ORDER_TRANSITIONED)
        );
        assert_eq!(
            map.get(&(Some(OrderStatus::OutForDelivery), OrderStatus::Delivered)),
            Some(&events::ORDER_TERMINAL_REACHED)
        );
        // 15 target states, each reachable from None plus 15 from-states
        assert_eq!(map.len(), 15 * 16);
    }
}
