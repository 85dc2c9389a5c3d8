use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{OrderState, Station};

/// StationMetricsRow tracks one order's dwell at one station.
/// Maps to `fulfillment_station_metrics` table.
///
/// A row opens when an order enters a station and closes when it leaves.
/// At most one open row exists per order; SLA breach is evaluated lazily
/// against `entered_at` rather than by any timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMetricsRow {
    pub id: i64,
    pub tenant_id: Uuid,
    pub order_id: i64,
    pub station: Station,
    /// State the order held when it entered the station
    pub state_at_entry: OrderState,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub sla_target_minutes: i64,
}

/// New StationMetricsRow for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStationMetricsRow {
    pub tenant_id: Uuid,
    pub order_id: i64,
    pub station: Station,
    pub state_at_entry: OrderState,
    pub entered_at: DateTime<Utc>,
    pub sla_target_minutes: i64,
}

impl StationMetricsRow {
    /// Whether the order is still sitting at this station
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }

    /// Minutes the order has dwelled at this station, as of `now` for open
    /// rows or as of exit for closed ones
    pub fn dwell_minutes(&self, now: DateTime<Utc>) -> i64 {
        let end = self.exited_at.unwrap_or(now);
        (end - self.entered_at).num_minutes()
    }
}
