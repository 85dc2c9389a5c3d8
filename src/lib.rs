#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fulfillment Core
//!
//! Order-fulfillment tracking and automation engine for a multi-tenant
//! e-commerce operations platform.
//!
//! ## Overview
//!
//! Carrier integrations are messy: webhooks redeliver, CSV exports get
//! re-uploaded, notification emails arrive with no structure at all, and
//! every courier speaks its own status vocabulary. Fulfillment Core turns
//! that noise into one consistent order lifecycle per tenant, with an
//! append-only transition log as the source of truth.
//!
//! ## Architecture
//!
//! The [`engine::FulfillmentEngine`] runs a single pipeline for every
//! ingestion channel: normalize the raw input, persist the shipment event
//! under a payload-derived idempotency key, attach it to an order by
//! tracking number, resolve the provider status through the three-tier
//! mapping registry, and drive the order state machine. Station dwell
//! tracking, SLA breach detection, courier scorecards, audit rows, and
//! lifecycle events all hang off those stages.
//!
//! ## Key Features
//!
//! - **Idempotent ingestion**: replays of the same logical event are
//!   recorded no-ops, never duplicate rows
//! - **Append-only state**: order status is the newest row of a transition
//!   log, so history is never rewritten
//! - **Three-tier status mapping**: tenant overrides, then provider
//!   defaults, then cross-carrier wildcards
//! - **Terminal state protection**: late carrier events cannot regress a
//!   delivered or cancelled order; the one sanctioned exit is an explicit
//!   return reopen
//! - **Station SLA tracking**: dwell clocks per operational station with
//!   lazy breach evaluation
//! - **Courier analytics**: daily buckets scored on a bounded 0-100 scale
//!
//! ## Module Organization
//!
//! - [`engine`] - Orchestration surface and ingestion pipeline
//! - [`ingestion`] - Channel normalizers (API, CSV, email, manual)
//! - [`state_machine`] - Order lifecycle with guards and actions
//! - [`mapping`] - Provider status resolution
//! - [`sla`] - Station dwell targets and breach predicates
//! - [`analytics`] - Courier performance scorecards
//! - [`audit`] - Audit trail and dead-letter queue
//! - [`storage`] - Storage seam with in-memory and PostgreSQL backends
//! - [`models`] - Data layer shared by every backend
//! - [`config`] - YAML configuration with environment overlays
//! - [`error`] - Structured error handling
//! - [`events`] - In-process lifecycle event bus
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use fulfillment_core::engine::FulfillmentEngine;
//! use fulfillment_core::storage::InMemoryStore;
//! use serde_json::json;
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let engine = FulfillmentEngine::new(Arc::new(InMemoryStore::new()));
//! let tenant_id = Uuid::new_v4();
//!
//! let result = engine
//!     .submit_api_event(
//!         tenant_id,
//!         &json!({
//!             "tracking_number": "AWB123456789",
//!             "status": "out_for_delivery",
//!             "provider": "aramex",
//!         }),
//!     )
//!     .await;
//!
//! assert!(result.success);
//! # });
//! ```
//!
//! ## Testing
//!
//! The in-memory backend keeps the full pipeline testable without a
//! database:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests including integration and property tests
//! ```
//!
//! PostgreSQL-backed tests are marked `#[ignore]` and run against
//! `DATABASE_URL` when one is provided.

pub mod analytics;
pub mod audit;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod idempotency;
pub mod ingestion;
pub mod logging;
pub mod mapping;
pub mod models;
pub mod sla;
pub mod state_machine;
pub mod storage;

pub use analytics::{composite_score, CourierScorecard, PerformanceAggregator, ScoreWeights};
pub use config::{ConfigManager, FulfillmentConfig};
pub use constants::{status_groups, system};
// Re-export constants events with different name to avoid conflict
pub use constants::events as system_events;
pub use engine::{FulfillmentEngine, OrderStatusView};
pub use error::{FulfillmentError, Result};
pub use events::{EventPublisher, PublishedEvent};
pub use ingestion::{IngestData, IngestReason, IngestResult, ManualEventRequest, NormalizedEvent};
pub use mapping::{MappingRegistry, MappingTier, ResolvedMapping};
pub use models::{IngestionMode, MappingRule, TriggeredBy};
pub use sla::{SlaTargets, StationMetricsView};
pub use state_machine::{OrderState, OrderStateMachine, Station};
pub use storage::{FulfillmentStore, InMemoryStore, StoreError};

#[cfg(feature = "postgres")]
pub use storage::PostgresStore;
