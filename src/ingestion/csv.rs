//! CSV batch channel.
//!
//! Carrier exports arrive as plain comma-separated text with no quoting
//! discipline, so parsing is a straight split. Headers match
//! case-insensitively and an `awb` column stands in for `tracking_number`
//! when the latter is absent. Rows without a resolvable tracking number are
//! dropped; partial and malformed files are expected, not fatal.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::types::NormalizedEvent;
use crate::constants::system::MAX_CSV_BATCH_ROWS;
use crate::models::IngestionMode;

#[derive(Debug, Default)]
struct ColumnMap {
    tracking: Option<usize>,
    status: Option<usize>,
    provider: Option<usize>,
    location: Option<usize>,
    description: Option<usize>,
    occurred_at: Option<usize>,
}

fn map_header(header_line: &str) -> ColumnMap {
    let mut map = ColumnMap::default();
    for (index, raw) in header_line.split(',').enumerate() {
        let name = raw.trim().to_lowercase();
        match name.as_str() {
            "tracking_number" => map.tracking = Some(index),
            // awb only fills the slot when tracking_number itself is absent
            "awb" => map.tracking = map.tracking.or(Some(index)),
            "status" | "provider_status" => map.status = map.status.or(Some(index)),
            "provider" | "carrier" => map.provider = map.provider.or(Some(index)),
            "location" => map.location = map.location.or(Some(index)),
            "description" | "note" => map.description = map.description.or(Some(index)),
            "occurred_at" | "timestamp" => map.occurred_at = map.occurred_at.or(Some(index)),
            _ => {}
        }
    }
    map
}

fn cell(fields: &[&str], index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| fields.get(i))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Normalize a whole CSV file, one event per resolvable row
pub fn normalize_csv_batch(csv_text: &str) -> Vec<NormalizedEvent> {
    normalize_csv_batch_with_limit(csv_text, MAX_CSV_BATCH_ROWS)
}

/// Same as [`normalize_csv_batch`] with a caller-supplied row cap
pub fn normalize_csv_batch_with_limit(csv_text: &str, max_rows: usize) -> Vec<NormalizedEvent> {
    let mut lines = csv_text.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        debug!("csv batch is empty");
        return Vec::new();
    };

    let columns = map_header(header_line);
    if columns.tracking.is_none() {
        warn!("csv batch has no tracking_number or awb column, dropping file");
        return Vec::new();
    }

    let mut events = Vec::new();
    for (row_number, line) in lines.enumerate() {
        if events.len() >= max_rows {
            warn!(max_rows, "csv batch exceeds row limit, ignoring remainder");
            break;
        }

        let fields: Vec<&str> = line.split(',').collect();
        let Some(tracking_number) = cell(&fields, columns.tracking) else {
            debug!(row = row_number + 2, "csv row has no tracking number, dropping");
            continue;
        };

        let occurred_at = cell(&fields, columns.occurred_at)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        events.push(NormalizedEvent {
            tracking_number: Some(tracking_number),
            provider: cell(&fields, columns.provider),
            provider_status: cell(&fields, columns.status),
            location: cell(&fields, columns.location),
            description: cell(&fields, columns.description),
            occurred_at,
            mode: IngestionMode::Csv,
            is_primary: true,
        });
    }
    events
}
