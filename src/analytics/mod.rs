//! Courier performance analytics.
//!
//! Daily buckets accumulate per (tenant, courier, region, date); rates and
//! the composite score are derived on read. The score starts from a neutral
//! 50 and bounds every factor's influence, so one bad afternoon cannot zero
//! out a courier.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CourierBucketUpdate, CourierPerformanceDaily};
use crate::storage::{FulfillmentStore, StoreResult};

/// Weights for the composite score formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub base: f64,
    pub delivery: f64,
    pub return_penalty: f64,
    pub on_time: f64,
    pub pickup_penalty: f64,
    /// Pickup delays beyond this many hours all cost the full penalty
    pub pickup_cap_hours: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            base: 50.0,
            delivery: 20.0,
            return_penalty: 15.0,
            on_time: 15.0,
            pickup_penalty: 10.0,
            pickup_cap_hours: 24.0,
        }
    }
}

/// Composite courier score on a 0-100 scale.
///
/// base + delivery x delivery_rate - return_penalty x return_rate
/// + on_time x on_time_rate - pickup_penalty x min(avg_pickup_hours /
/// pickup_cap_hours, 1), clamped and rounded.
pub fn composite_score_with(
    weights: &ScoreWeights,
    delivery_rate: f64,
    return_rate: f64,
    on_time_rate: f64,
    avg_pickup_hours: f64,
) -> i32 {
    let pickup_factor = (avg_pickup_hours / weights.pickup_cap_hours).clamp(0.0, 1.0);
    let raw = weights.base + weights.delivery * delivery_rate
        - weights.return_penalty * return_rate
        + weights.on_time * on_time_rate
        - weights.pickup_penalty * pickup_factor;
    raw.clamp(0.0, 100.0).round() as i32
}

/// Composite score with the standard weights
pub fn composite_score(
    delivery_rate: f64,
    return_rate: f64,
    on_time_rate: f64,
    avg_pickup_hours: f64,
) -> i32 {
    composite_score_with(
        &ScoreWeights::default(),
        delivery_rate,
        return_rate,
        on_time_rate,
        avg_pickup_hours,
    )
}

/// One courier bucket with its derived rates and score
#[derive(Debug, Clone, Serialize)]
pub struct CourierScorecard {
    pub courier: String,
    pub region: String,
    pub date: NaiveDate,
    pub total_count: i32,
    pub delivered_count: i32,
    pub returned_count: i32,
    pub delivery_rate: f64,
    pub return_rate: f64,
    pub on_time_rate: f64,
    pub avg_pickup_hours: f64,
    pub score: i32,
}

impl CourierScorecard {
    pub fn from_daily(daily: &CourierPerformanceDaily) -> Self {
        Self::from_daily_with(daily, &ScoreWeights::default())
    }

    pub fn from_daily_with(daily: &CourierPerformanceDaily, weights: &ScoreWeights) -> Self {
        let delivery_rate = daily.delivery_rate();
        let return_rate = daily.return_rate();
        let on_time_rate = daily.on_time_rate();
        let avg_pickup_hours = daily.avg_pickup_hours();
        Self {
            courier: daily.courier.clone(),
            region: daily.region.clone(),
            date: daily.date,
            total_count: daily.total_count,
            delivered_count: daily.delivered_count,
            returned_count: daily.returned_count,
            delivery_rate,
            return_rate,
            on_time_rate,
            avg_pickup_hours,
            score: composite_score_with(
                weights,
                delivery_rate,
                return_rate,
                on_time_rate,
                avg_pickup_hours,
            ),
        }
    }
}

/// Accumulates shipment outcomes into daily courier buckets
#[derive(Debug)]
pub struct PerformanceAggregator<S> {
    store: Arc<S>,
    weights: ScoreWeights,
}

impl<S: FulfillmentStore> PerformanceAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            weights: ScoreWeights::default(),
        }
    }

    pub fn with_weights(store: Arc<S>, weights: ScoreWeights) -> Self {
        Self { store, weights }
    }

    /// Record a completed delivery, with its SLA verdict and the hours the
    /// parcel waited between order creation and carrier pickup when known
    pub async fn record_delivery(
        &self,
        tenant_id: Uuid,
        courier: &str,
        region: &str,
        date: NaiveDate,
        on_time: bool,
        pickup_hours: Option<f64>,
    ) -> StoreResult<CourierPerformanceDaily> {
        self.store
            .apply_courier_update(CourierBucketUpdate {
                tenant_id,
                courier: courier.to_string(),
                region: region.to_string(),
                date,
                delivered: true,
                returned: false,
                on_time,
                pickup_hours,
            })
            .await
    }

    /// Record a completed return
    pub async fn record_return(
        &self,
        tenant_id: Uuid,
        courier: &str,
        region: &str,
        date: NaiveDate,
    ) -> StoreResult<CourierPerformanceDaily> {
        self.store
            .apply_courier_update(CourierBucketUpdate {
                tenant_id,
                courier: courier.to_string(),
                region: region.to_string(),
                date,
                delivered: false,
                returned: true,
                on_time: false,
                pickup_hours: None,
            })
            .await
    }

    /// Buckets in a date range, scored
    pub async fn scorecards(
        &self,
        tenant_id: Uuid,
        courier: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<CourierScorecard>> {
        let buckets = self
            .store
            .list_courier_performance(tenant_id, courier, from, to)
            .await?;
        Ok(buckets
            .iter()
            .map(|daily| CourierScorecard::from_daily_with(daily, &self.weights))
            .collect())
    }
}

impl<S> Clone for PerformanceAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            weights: self.weights,
        }
    }
}
