//! Multi-channel event normalization.
//!
//! One submodule per ingestion channel (API webhook, CSV batch, inbound
//! email, manual entry), each converting raw input into canonical
//! [`NormalizedEvent`]s. Normalizers never fail: malformed input yields an
//! empty batch and downstream stages tolerate zero events.

pub mod api;
pub mod csv;
pub mod email;
pub mod manual;
pub mod types;

pub use api::normalize_api_payload;
pub use csv::{normalize_csv_batch, normalize_csv_batch_with_limit};
pub use email::normalize_email_body;
pub use manual::{normalize_manual_entry, ManualEventRequest};
pub use types::{IngestData, IngestReason, IngestResult, NormalizedEvent};
