use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// CourierPerformanceDaily is one courier's aggregate for one day and region.
/// Maps to `fulfillment_courier_performance_daily` table.
///
/// Buckets accumulate counts as shipments complete; rates and the composite
/// score are derived on read so historical rows never go stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierPerformanceDaily {
    pub id: i64,
    pub tenant_id: Uuid,
    pub courier: String,
    pub region: String,
    pub date: NaiveDate,
    /// Completed shipments (delivered or returned) attributed to the bucket
    pub total_count: i32,
    pub delivered_count: i32,
    pub returned_count: i32,
    /// Deliveries that landed within their station SLA
    pub on_time_count: i32,
    /// Sum of creation-to-pickup durations, in hours
    pub pickup_hours_total: f64,
    /// Number of pickups contributing to `pickup_hours_total`
    pub pickup_count: i32,
    pub updated_at: DateTime<Utc>,
}

/// Incremental update folded into a daily bucket as a shipment progresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierBucketUpdate {
    pub tenant_id: Uuid,
    pub courier: String,
    pub region: String,
    pub date: NaiveDate,
    pub delivered: bool,
    pub returned: bool,
    /// Only meaningful when `delivered` is set
    pub on_time: bool,
    /// Creation-to-pickup duration observed at carrier handoff
    pub pickup_hours: Option<f64>,
}

impl CourierPerformanceDaily {
    /// Fresh empty bucket for a (tenant, courier, region, date) key
    pub fn empty(tenant_id: Uuid, courier: &str, region: &str, date: NaiveDate) -> Self {
        Self {
            id: 0,
            tenant_id,
            courier: courier.to_string(),
            region: region.to_string(),
            date,
            total_count: 0,
            delivered_count: 0,
            returned_count: 0,
            on_time_count: 0,
            pickup_hours_total: 0.0,
            pickup_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// Fold an update into this bucket
    pub fn apply(&mut self, update: &CourierBucketUpdate) {
        if update.delivered {
            self.total_count += 1;
            self.delivered_count += 1;
            if update.on_time {
                self.on_time_count += 1;
            }
        }
        if update.returned {
            self.total_count += 1;
            self.returned_count += 1;
        }
        if let Some(hours) = update.pickup_hours {
            self.pickup_hours_total += hours;
            self.pickup_count += 1;
        }
        self.updated_at = Utc::now();
    }

    /// Fraction of completed shipments that were delivered, zero when empty
    pub fn delivery_rate(&self) -> f64 {
        ratio(self.delivered_count, self.total_count)
    }

    /// Fraction of completed shipments that came back, zero when empty
    pub fn return_rate(&self) -> f64 {
        ratio(self.returned_count, self.total_count)
    }

    /// Fraction of deliveries that landed within SLA, zero when no deliveries
    pub fn on_time_rate(&self) -> f64 {
        ratio(self.on_time_count, self.delivered_count)
    }

    /// Mean creation-to-pickup duration in hours, zero when no pickups seen
    pub fn avg_pickup_hours(&self) -> f64 {
        if self.pickup_count == 0 {
            0.0
        } else {
            self.pickup_hours_total / f64::from(self.pickup_count)
        }
    }
}

fn ratio(numerator: i32, denominator: i32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        f64::from(numerator) / f64::from(denominator)
    }
}
