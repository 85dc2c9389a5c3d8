//! Manual entry channel.
//!
//! Operators record status updates by hand when a carrier has no feed or a
//! customer calls in. Entries are trusted but still travel the shared
//! pipeline so they get the same idempotency, mapping, and audit treatment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::NormalizedEvent;
use crate::models::IngestionMode;

/// Operator-entered status update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEventRequest {
    pub tracking_number: String,
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalize a manual entry into at most one event
pub fn normalize_manual_entry(request: &ManualEventRequest) -> Vec<NormalizedEvent> {
    let Some(tracking_number) = clean(&request.tracking_number) else {
        debug!("manual entry has no tracking number, dropping");
        return Vec::new();
    };

    vec![NormalizedEvent {
        tracking_number: Some(tracking_number),
        provider: request.provider.as_deref().and_then(clean),
        provider_status: clean(&request.status),
        location: None,
        description: request.note.as_deref().and_then(clean),
        occurred_at: request.occurred_at.unwrap_or_else(Utc::now),
        mode: IngestionMode::Manual,
        is_primary: true,
    }]
}
