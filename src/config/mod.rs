//! Configuration system.
//!
//! YAML-based configuration with environment-specific overlays. A base
//! `fulfillment-config.yaml` holds shared settings; `development`, `test`,
//! and `production` sections override individual keys for that environment.
//! Every section has working defaults, so a missing file or a partial one
//! still yields a valid [`FulfillmentConfig`].
//!
//! ```rust,no_run
//! use fulfillment_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let targets = manager.config().sla.targets();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};

use crate::analytics::ScoreWeights;
use crate::constants::{sla as sla_defaults, system};
use crate::sla::SlaTargets;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration mirroring fulfillment-config.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    /// System-wide settings
    pub system: SystemConfig,

    /// Per-station SLA targets
    pub sla: SlaConfig,

    /// Ingestion channel limits and toggles
    pub ingestion: IngestionConfig,

    /// Dead-letter retry bookkeeping
    pub retry: RetryConfig,

    /// In-process event bus sizing
    pub events: EventsConfig,

    /// Courier analytics tuning
    pub analytics: AnalyticsConfig,
}

impl FulfillmentConfig {
    /// Reject configurations that would misbehave at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, minutes) in [
            ("sla.call_center_minutes", self.sla.call_center_minutes),
            ("sla.operations_minutes", self.sla.operations_minutes),
            ("sla.finance_minutes", self.sla.finance_minutes),
            ("sla.returns_minutes", self.sla.returns_minutes),
        ] {
            if minutes <= 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    minutes.to_string(),
                    "SLA targets must be positive minutes",
                ));
            }
        }
        if self.retry.max_retries < 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_retries",
                self.retry.max_retries.to_string(),
                "retry budget cannot be negative",
            ));
        }
        if self.events.broadcast_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.broadcast_capacity",
                "0",
                "the event channel needs room for at least one event",
            ));
        }
        if self.ingestion.max_csv_batch_rows == 0 {
            return Err(ConfigurationError::invalid_value(
                "ingestion.max_csv_batch_rows",
                "0",
                "a zero-row CSV limit would drop every batch",
            ));
        }
        if self.analytics.weights.pickup_cap_hours <= 0.0 {
            return Err(ConfigurationError::invalid_value(
                "analytics.weights.pickup_cap_hours",
                self.analytics.weights.pickup_cap_hours.to_string(),
                "pickup cap must be positive hours",
            ));
        }
        Ok(())
    }
}

/// System-wide settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Runtime environment, set by the loader after overlay resolution
    pub environment: String,
    pub version: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            version: system::FULFILLMENT_CORE_VERSION.to_string(),
        }
    }
}

/// Per-station SLA targets in minutes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SlaConfig {
    pub call_center_minutes: i64,
    pub operations_minutes: i64,
    pub finance_minutes: i64,
    pub returns_minutes: i64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            call_center_minutes: sla_defaults::CALL_CENTER_TARGET_MINUTES,
            operations_minutes: sla_defaults::OPERATIONS_TARGET_MINUTES,
            finance_minutes: sla_defaults::FINANCE_TARGET_MINUTES,
            returns_minutes: sla_defaults::RETURNS_TARGET_MINUTES,
        }
    }
}

impl SlaConfig {
    pub fn targets(&self) -> SlaTargets {
        SlaTargets {
            call_center_minutes: self.call_center_minutes,
            operations_minutes: self.operations_minutes,
            finance_minutes: self.finance_minutes,
            returns_minutes: self.returns_minutes,
        }
    }
}

/// Ingestion channel limits and toggles
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Rows processed per CSV batch before the remainder is ignored
    pub max_csv_batch_rows: usize,
    /// Seed the mapping registry with the cross-carrier wildcard defaults
    pub seed_default_mappings: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_csv_batch_rows: system::MAX_CSV_BATCH_ROWS,
            seed_default_mappings: true,
        }
    }
}

/// Dead-letter retry bookkeeping
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: i32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: system::DEFAULT_MAX_RETRIES,
        }
    }
}

/// In-process event bus sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub broadcast_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 1000,
        }
    }
}

/// Courier analytics tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Region recorded when an event carries no location
    pub default_region: String,
    pub weights: ScoreWeights,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_region: system::UNKNOWN.to_string(),
            weights: ScoreWeights::default(),
        }
    }
}
