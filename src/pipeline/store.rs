//! SQLite-backed listing store
//!
//! Durable record of every fetched adoption listing, keyed by source id.
//! Single-writer discipline comes from the connection mutex; every write
//! runs in a short-lived transaction scoped to one record, so an aborted
//! reconciliation run leaves a valid store behind.
//!
//! Schema lives in `/sql/` and is applied by [`run_schema_migrations`];
//! this module does not create tables on open.

use super::types::{AgeCategory, IncomingListing, Listing, ListingStatus, UpsertOutcome};
use crate::metrics::window::MetricsWindow;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Listing store operation errors.
#[derive(Debug)]
pub enum StoreError {
    /// Stale or out-of-order update; the incoming record must be discarded.
    Conflict(String),
    Database(rusqlite::Error),
    /// A stored row no longer parses into the typed model.
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(msg) => write!(f, "conflict: {}", msg),
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Corrupt(msg) => write!(f, "corrupt row: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Run schema migrations from SQL files.
///
/// Reads all `.sql` files from `schema_dir` in name order and executes
/// them. Every file uses `IF NOT EXISTS` clauses, so re-running is safe.
pub fn run_schema_migrations(
    conn: &mut Connection,
    schema_dir: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(format!("Schema directory not found: {}", schema_dir).into());
    }

    // WAL keeps readers (metrics queries) from blocking the writer.
    conn.pragma_update(None, "journal_mode", "WAL")?;

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Applying schema from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = path.file_name().unwrap().to_string_lossy().into_owned();

        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;

        log::debug!("   └─ applied {}", filename);
    }

    Ok(())
}

/// SQLite listing store.
///
/// The shared handle passed into both the reconciler and the query
/// facade. Callers must run [`run_schema_migrations`] against the
/// database before opening the store.
pub struct ListingStore {
    conn: Arc<Mutex<Connection>>,
}

impl ListingStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or update one validated listing.
    ///
    /// - absent → insert with `first_seen_at = status_changed_at = now`
    /// - present, same status → `Unchanged`, no write
    /// - present, new status → update status and `status_changed_at = now`
    ///
    /// Fails with [`StoreError::Conflict`] if the write would move
    /// `status_changed_at` backward, or would record an adoption earlier
    /// than the listing's own publication time. Conflicting records are
    /// the caller's to discard.
    pub fn upsert(&self, incoming: &IncomingListing, now: i64) -> Result<UpsertOutcome, StoreError> {
        let conn = self.conn.lock().unwrap();

        let existing: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT status, status_changed_at, published_at
                 FROM listings WHERE source_id = ?1",
                [&incoming.source_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match existing {
            None => {
                if incoming.status == ListingStatus::Adopted && now < incoming.published_at {
                    return Err(StoreError::Conflict(format!(
                        "adoption of {} observed before its published_at",
                        incoming.source_id
                    )));
                }

                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO organizations (organization_id, name, created_at)
                     VALUES (?1, '', ?2)",
                    params![incoming.organization_id, now],
                )?;
                tx.execute(
                    "INSERT INTO listings (
                        source_id, organization_id, species, age_category,
                        status, published_at, status_changed_at, first_seen_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        incoming.source_id,
                        incoming.organization_id,
                        incoming.species,
                        incoming.age_category.as_str(),
                        incoming.status.as_str(),
                        incoming.published_at,
                        now,
                        now,
                    ],
                )?;
                Self::bump_marker(&tx, &incoming.organization_id, now)?;
                tx.commit()?;

                Ok(UpsertOutcome::Inserted)
            }
            Some((stored_status, stored_changed_at, stored_published_at)) => {
                if stored_status == incoming.status.as_str() {
                    return Ok(UpsertOutcome::Unchanged);
                }

                if now < stored_changed_at {
                    return Err(StoreError::Conflict(format!(
                        "status_changed_at would move backward for {} ({} < {})",
                        incoming.source_id, now, stored_changed_at
                    )));
                }
                if incoming.status == ListingStatus::Adopted && now < stored_published_at {
                    return Err(StoreError::Conflict(format!(
                        "adoption of {} observed before its published_at",
                        incoming.source_id
                    )));
                }

                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "UPDATE listings SET status = ?1, status_changed_at = ?2
                     WHERE source_id = ?3",
                    params![incoming.status.as_str(), now, incoming.source_id],
                )?;
                Self::bump_marker(&tx, &incoming.organization_id, now)?;
                tx.commit()?;

                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Fetch one listing; unknown ids are an empty result, not a fault.
    pub fn get_by_source_id(&self, source_id: &str) -> Result<Option<Listing>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                "SELECT source_id, organization_id, species, age_category,
                        status, published_at, status_changed_at, first_seen_at
                 FROM listings WHERE source_id = ?1",
                [source_id],
                Self::read_listing_row,
            )
            .optional()?;

        row.map(Self::parse_listing_row).transpose()
    }

    /// Listings relevant to one organization and window: anything
    /// published or status-transitioned inside `[start, end)`.
    ///
    /// Ordered by `published_at` then `source_id`, so a re-issued query
    /// restarts deterministically.
    pub fn query_window(
        &self,
        organization_id: &str,
        window: &MetricsWindow,
    ) -> Result<Vec<Listing>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT source_id, organization_id, species, age_category,
                    status, published_at, status_changed_at, first_seen_at
             FROM listings
             WHERE organization_id = ?1
               AND ((published_at >= ?2 AND published_at < ?3)
                 OR (status_changed_at >= ?2 AND status_changed_at < ?3))
             ORDER BY published_at ASC, source_id ASC",
        )?;

        let rows = stmt.query_map(
            params![organization_id, window.start(), window.end()],
            Self::read_listing_row,
        )?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(Self::parse_listing_row(row?)?);
        }
        Ok(listings)
    }

    /// Current reconciliation sequence for an organization (0 if it has
    /// never been touched). Changes exactly when an applied write lands.
    pub fn reconciliation_marker(&self, organization_id: &str) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        let seq: Option<i64> = conn
            .query_row(
                "SELECT seq FROM reconcile_marks WHERE organization_id = ?1",
                [organization_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(seq.unwrap_or(0))
    }

    fn bump_marker(conn: &Connection, organization_id: &str, now: i64) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO reconcile_marks (organization_id, seq, updated_at)
             VALUES (?1, 1, ?2)
             ON CONFLICT(organization_id) DO UPDATE SET
                seq = seq + 1,
                updated_at = excluded.updated_at",
            params![organization_id, now],
        )?;
        Ok(())
    }

    fn read_listing_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(String, String, Option<String>, String, String, i64, i64, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn parse_listing_row(
        raw: (String, String, Option<String>, String, String, i64, i64, i64),
    ) -> Result<Listing, StoreError> {
        let (source_id, organization_id, species, age_str, status_str, published_at, status_changed_at, first_seen_at) =
            raw;

        let age_category = AgeCategory::parse(&age_str)
            .ok_or_else(|| StoreError::Corrupt(format!("age_category '{}' for {}", age_str, source_id)))?;
        let status = ListingStatus::parse(&status_str)
            .ok_or_else(|| StoreError::Corrupt(format!("status '{}' for {}", status_str, source_id)))?;

        Ok(Listing {
            source_id,
            organization_id,
            species,
            age_category,
            status,
            published_at,
            status_changed_at,
            first_seen_at,
        })
    }
}
