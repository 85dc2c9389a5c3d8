pub mod audit_log;
pub mod courier_performance;
pub mod dead_letter;
pub mod order_transition;
pub mod shipment_event;
pub mod station_metrics;
pub mod status_mapping;

// Re-export core models for easy access
pub use audit_log::{AuditLogEntry, NewAuditLogEntry};
pub use courier_performance::{CourierBucketUpdate, CourierPerformanceDaily};
pub use dead_letter::{DeadLetterEntry, NewDeadLetterEntry};
pub use order_transition::{NewOrderTransition, OrderTransition, TriggeredBy};
pub use shipment_event::{IngestionMode, NewShipmentEvent, ShipmentEvent};
pub use station_metrics::{NewStationMetricsRow, StationMetricsRow};
pub use status_mapping::MappingRule;
