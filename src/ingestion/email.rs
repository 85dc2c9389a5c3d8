//! Inbound email channel.
//!
//! Carrier notification emails are freeform text. Tracking references are
//! carrier-style tokens (2-4 letter prefix, then at least 6 digits) scanned
//! after uppercase normalization; status comes from an ordered phrase list
//! where the first match wins. An email with no recognizable reference or
//! phrase still yields an event so it lands in the manual triage queue
//! instead of vanishing.

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::types::NormalizedEvent;
use crate::models::IngestionMode;

static TRACKING_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2,4}[0-9]{6,}\b").unwrap());

/// Ordered phrase rules; earlier entries win when several phrases appear
const STATUS_PHRASES: [(&str, &str); 5] = [
    ("delivered", "delivered"),
    ("in transit", "in_transit"),
    ("out for delivery", "out_for_delivery"),
    ("picked up", "picked_up"),
    ("returned", "returned"),
];

fn extract_references(body: &str) -> Vec<String> {
    let upper = body.to_uppercase();
    let mut references = Vec::new();
    for found in TRACKING_REF.find_iter(&upper) {
        let reference = found.as_str().to_string();
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

fn resolve_status_phrase(body: &str) -> Option<String> {
    let lower = body.to_lowercase();
    STATUS_PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, status)| (*status).to_string())
}

fn triage_snippet(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(500).collect())
}

/// Normalize an email body, one event per tracking reference found.
///
/// Multiple references share the resolved status; only the first is marked
/// primary. No reference at all still produces a single unroutable event.
pub fn normalize_email_body(email_body: &str) -> Vec<NormalizedEvent> {
    if email_body.trim().is_empty() {
        debug!("email body is empty");
        return Vec::new();
    }

    let references = extract_references(email_body);
    let provider_status = resolve_status_phrase(email_body);
    let description = triage_snippet(email_body);
    let occurred_at = Utc::now();

    if references.is_empty() {
        debug!("email has no tracking reference, keeping for triage");
        return vec![NormalizedEvent {
            tracking_number: None,
            provider: None,
            provider_status,
            location: None,
            description,
            occurred_at,
            mode: IngestionMode::Email,
            is_primary: true,
        }];
    }

    references
        .into_iter()
        .enumerate()
        .map(|(index, reference)| NormalizedEvent {
            tracking_number: Some(reference),
            provider: None,
            provider_status: provider_status.clone(),
            location: None,
            description: description.clone(),
            occurred_at,
            mode: IngestionMode::Email,
            is_primary: index == 0,
        })
        .collect()
}
