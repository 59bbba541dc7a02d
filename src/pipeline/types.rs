//! Core record types for the ingestion pipeline
//!
//! Raw source payloads are deserialized into [`RawListingRecord`] and must
//! pass [`RawListingRecord::validate`] before they can touch the store.
//! Records that fail validation feed the partial-batch failure path and
//! never reach the reconciler's write side.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an adoption listing.
///
/// Removal from the source is a status, not a delete: history must stay
/// recomputable for every window that ever saw the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingStatus {
    Adoptable,
    Adopted,
    Removed,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Adoptable => "adoptable",
            ListingStatus::Adopted => "adopted",
            ListingStatus::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "adoptable" => Some(ListingStatus::Adoptable),
            "adopted" => Some(ListingStatus::Adopted),
            "removed" => Some(ListingStatus::Removed),
            _ => None,
        }
    }
}

/// Source-reported age bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeCategory {
    Baby,
    Young,
    Adult,
    Senior,
}

impl AgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeCategory::Baby => "baby",
            AgeCategory::Young => "young",
            AgeCategory::Adult => "adult",
            AgeCategory::Senior => "senior",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "baby" => Some(AgeCategory::Baby),
            "young" => Some(AgeCategory::Young),
            "adult" => Some(AgeCategory::Adult),
            "senior" => Some(AgeCategory::Senior),
            _ => None,
        }
    }
}

/// One raw adoption record as fetched from the source.
///
/// Every field is optional because the payload is untrusted; the typed
/// form only exists behind [`RawListingRecord::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawListingRecord {
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    /// Age bucket string: baby/young/adult/senior.
    #[serde(default)]
    pub age: Option<String>,
    /// Status string: adoptable/adopted/removed.
    #[serde(default)]
    pub status: Option<String>,
    /// Source-reported listing creation time, RFC 3339.
    #[serde(default)]
    pub published_at: Option<String>,
}

/// Why a raw record was rejected before reconciliation.
#[derive(Debug)]
pub enum ValidationError {
    MissingField(&'static str),
    InvalidStatus(String),
    InvalidAge(String),
    InvalidTimestamp(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "missing field: {}", field),
            ValidationError::InvalidStatus(s) => write!(f, "invalid status: {}", s),
            ValidationError::InvalidAge(s) => write!(f, "invalid age category: {}", s),
            ValidationError::InvalidTimestamp(s) => write!(f, "invalid timestamp: {}", s),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RawListingRecord {
    /// Source id for failure reporting, tolerating records without one.
    pub fn source_id_or_placeholder(&self) -> String {
        match self.source_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => "<missing source_id>".to_string(),
        }
    }

    /// Validate the raw payload into a typed incoming listing.
    ///
    /// Rejects missing identifiers, unknown status/age strings and
    /// unparseable timestamps. The original source also emits a "found"
    /// status; it is outside the adoptable/adopted/removed lifecycle and
    /// is rejected here rather than coerced.
    pub fn validate(&self) -> Result<IncomingListing, ValidationError> {
        let source_id = require_str(&self.source_id, "source_id")?;
        let organization_id = require_str(&self.organization_id, "organization_id")?;

        let status_str = require_str(&self.status, "status")?;
        let status = ListingStatus::parse(&status_str)
            .ok_or_else(|| ValidationError::InvalidStatus(status_str.clone()))?;

        let age_str = require_str(&self.age, "age")?;
        let age_category = AgeCategory::parse(&age_str)
            .ok_or_else(|| ValidationError::InvalidAge(age_str.clone()))?;

        let published_raw = require_str(&self.published_at, "published_at")?;
        let published_at = chrono::DateTime::parse_from_rfc3339(&published_raw)
            .map_err(|_| ValidationError::InvalidTimestamp(published_raw.clone()))?
            .timestamp();

        Ok(IncomingListing {
            source_id,
            organization_id,
            species: self.species.clone(),
            age_category,
            status,
            published_at,
        })
    }
}

fn require_str(value: &Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value.as_deref() {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// A validated record, ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingListing {
    pub source_id: String,
    pub organization_id: String,
    pub species: Option<String>,
    pub age_category: AgeCategory,
    pub status: ListingStatus,
    /// Unix seconds, converted once at validation.
    pub published_at: i64,
}

/// A stored listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub source_id: String,
    pub organization_id: String,
    pub species: Option<String>,
    pub age_category: AgeCategory,
    pub status: ListingStatus,
    pub published_at: i64,
    /// Last ingestion-observed status transition (unix seconds).
    pub status_changed_at: i64,
    pub first_seen_at: i64,
}

impl Listing {
    /// Seconds from publication to observed adoption, if adopted.
    pub fn time_to_adoption_secs(&self) -> Option<i64> {
        match self.status {
            ListingStatus::Adopted => Some(self.status_changed_at - self.published_at),
            _ => None,
        }
    }
}

/// Result of a single upsert against the listing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Best-effort outcome of reconciling one page (or a whole sync).
///
/// `failed` enumerates the source ids that were skipped; it never aborts
/// the rest of the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub applied: usize,
    pub unchanged: usize,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn merge(&mut self, other: ReconcileReport) {
        self.applied += other.applied;
        self.unchanged += other.unchanged;
        self.failed.extend(other.failed);
    }
}
