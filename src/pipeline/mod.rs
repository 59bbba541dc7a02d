//! # Incremental listing ingestion pipeline
//!
//! Turns raw paginated adoption records from the source into durable,
//! reconciled listing history:
//!
//! ```text
//! ListingSource (paginated fetch)
//!     ↓
//! RawListingRecord → validate → IncomingListing
//!     ↓
//! Reconciler::reconcile_page()
//!     ↓
//! ListingStore (SQLite: listings, organizations, reconcile_marks)
//!     ↓
//! metrics engine / query facade (read side)
//! ```
//!
//! Key properties:
//! - Upserts are idempotent; re-reconciling a page is a no-op.
//! - `status_changed_at` never moves backward; stale replays are
//!   discarded as conflicts, not applied.
//! - A page reconciles best-effort: malformed records land in the
//!   report's failure list without blocking their neighbors.
//! - Listings are never deleted; source-side removal is a status.
//!
//! ## Module Organization
//!
//! - `types` - Raw/validated/stored record types and reports
//! - `store` - SQLite listing store and schema migrations
//! - `reconciler` - Page-level merge of fetched records into the store
//! - `fetch` - Abstract paginated source + JSONL drop-file impl
//! - `ingestion` - On-demand and scheduled sync loop
//! - `config` - Runtime configuration from environment

pub mod config;
pub mod fetch;
pub mod ingestion;
pub mod reconciler;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::EtlConfig;
pub use fetch::{JsonlListingSource, ListingPage, ListingSource};
pub use ingestion::{start_etl_ingestion, sync_organization, IngestJob};
pub use reconciler::Reconciler;
pub use store::{run_schema_migrations, ListingStore, StoreError};
pub use types::{
    AgeCategory, IncomingListing, Listing, ListingStatus, RawListingRecord, ReconcileReport,
    UpsertOutcome,
};
