//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and
//! files for tracing ingestion pipelines and order transitions across async
//! tasks. Host platforms call [`init_structured_logging`] once at startup;
//! library code logs through `tracing` macros and the operation helpers
//! below.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Console output stays human-readable; the file layer writes JSON lines so
/// log shippers can ingest them. Safe to call more than once.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir).expect("Failed to create log directory");
        }

        // One file per process so concurrent deployments never interleave
        let pid = process::id();
        let log_filename = format!(
            "{environment}.{pid}.{}.log",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(false)
            .json()
            .with_filter(EnvFilter::new(log_level));

        // try_init: the host may have installed its own subscriber already
        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "🔧 STRUCTURED LOGGING: Initialized with file output"
        );

        // The non-blocking writer stops flushing once its guard drops, so the
        // guard must live as long as the process
        std::mem::forget(guard);
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("FULFILLMENT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// One accepted shipment event, tagged with its ingestion channel
pub fn log_ingest_operation(
    channel: &str,
    tenant_id: &str,
    tracking_number: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        channel = %channel,
        tenant_id = %tenant_id,
        tracking_number = tracking_number,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 INGEST_OPERATION"
    );
}

/// One persisted order transition
pub fn log_transition_operation(
    order_id: i64,
    from_state: Option<&str>,
    to_state: &str,
    station: &str,
    details: Option<&str>,
) {
    tracing::info!(
        order_id = order_id,
        from_state = from_state,
        to_state = %to_state,
        station = %station,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔄 ORDER_TRANSITION"
    );
}

/// One station bookkeeping decision, usually an SLA breach flag
pub fn log_station_operation(
    operation: &str,
    order_id: i64,
    station: &str,
    dwell_minutes: Option<i64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        order_id = order_id,
        station = %station,
        dwell_minutes = dwell_minutes,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "⏱️ STATION_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("FULFILLMENT_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("FULFILLMENT_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }
}
