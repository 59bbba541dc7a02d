//! Ingestion reconciler
//!
//! Merges freshly fetched pages into the listing store. Reconciliation
//! is best-effort per record: a malformed or conflicting record is
//! logged, reported in the page's failure list, and never blocks the
//! rest of the page. Transition times are stamped with the ingestion
//! clock, not source metadata: the source does not reliably report
//! when a status actually changed.

use super::store::{ListingStore, StoreError};
use super::types::{RawListingRecord, ReconcileReport, UpsertOutcome};
use std::sync::Arc;

/// Page-level reconciler over a shared store handle.
pub struct Reconciler {
    store: Arc<ListingStore>,

    /// Timestamp function (for testing with mock time)
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl Reconciler {
    pub fn new(store: Arc<ListingStore>) -> Self {
        Self::new_with_timestamp_fn(store, Box::new(|| chrono::Utc::now().timestamp()))
    }

    /// Create a reconciler with a custom timestamp function.
    pub fn new_with_timestamp_fn(
        store: Arc<ListingStore>,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self { store, now_fn }
    }

    pub fn store(&self) -> &Arc<ListingStore> {
        &self.store
    }

    /// Reconcile one page of raw records against the store.
    ///
    /// Every record is validated and upserted independently; the report
    /// counts applied writes and no-ops and enumerates the source ids of
    /// skipped records. Re-running the same page is a no-op.
    pub fn reconcile_page(&self, records: &[RawListingRecord]) -> ReconcileReport {
        let now = (self.now_fn)();
        let mut report = ReconcileReport::default();

        for record in records {
            let incoming = match record.validate() {
                Ok(incoming) => incoming,
                Err(e) => {
                    let id = record.source_id_or_placeholder();
                    log::warn!("⚠️  Skipping record {}: {}", id, e);
                    report.failed.push(id);
                    continue;
                }
            };

            match self.store.upsert(&incoming, now) {
                Ok(UpsertOutcome::Inserted) | Ok(UpsertOutcome::Updated) => report.applied += 1,
                Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                Err(StoreError::Conflict(msg)) => {
                    log::warn!("⚠️  Discarding stale record {}: {}", incoming.source_id, msg);
                    report.failed.push(incoming.source_id);
                }
                Err(e) => {
                    log::error!("❌ Failed to upsert {}: {}", incoming.source_id, e);
                    report.failed.push(incoming.source_id);
                }
            }
        }

        log::debug!(
            "Reconciled page: {} applied, {} unchanged, {} failed",
            report.applied,
            report.unchanged,
            report.failed.len()
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::store::run_schema_migrations;
    use crate::pipeline::types::ListingStatus;
    use rusqlite::Connection;
    use tempfile::NamedTempFile;

    fn create_test_reconciler(now: i64) -> (NamedTempFile, Reconciler) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();

        let mut conn = Connection::open(db_path).unwrap();
        run_schema_migrations(&mut conn, "sql").unwrap();
        drop(conn);

        let store = Arc::new(ListingStore::open(db_path).unwrap());
        let reconciler = Reconciler::new_with_timestamp_fn(store, Box::new(move || now));
        (temp_file, reconciler)
    }

    fn raw(source_id: &str, status: &str) -> RawListingRecord {
        RawListingRecord {
            source_id: Some(source_id.to_string()),
            organization_id: Some("org1".to_string()),
            species: Some("cat".to_string()),
            age: Some("adult".to_string()),
            status: Some(status.to_string()),
            published_at: Some("2024-03-01T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_reconcile_page_applies_valid_records() {
        let (_temp, reconciler) = create_test_reconciler(1709300000);

        let page = vec![raw("pf-1", "adoptable"), raw("pf-2", "adoptable")];
        let report = reconciler.reconcile_page(&page);

        assert_eq!(report.applied, 2);
        assert_eq!(report.unchanged, 0);
        assert!(report.failed.is_empty());

        let store = reconciler.store();
        assert!(store.get_by_source_id("pf-1").unwrap().is_some());
        assert!(store.get_by_source_id("pf-2").unwrap().is_some());
    }

    #[test]
    fn test_reconcile_page_is_idempotent() {
        let (_temp, reconciler) = create_test_reconciler(1709300000);
        let page = vec![raw("pf-1", "adoptable"), raw("pf-2", "adopted")];

        let first = reconciler.reconcile_page(&page);
        assert_eq!(first.applied, 2);

        // Same page again: identical store state, no new writes.
        let second = reconciler.reconcile_page(&page);
        assert_eq!(second.applied, 0);
        assert_eq!(second.unchanged, 2);
        assert!(second.failed.is_empty());

        let store = reconciler.store();
        let listing = store.get_by_source_id("pf-2").unwrap().unwrap();
        assert_eq!(listing.status, ListingStatus::Adopted);
        assert_eq!(listing.status_changed_at, 1709300000);
        assert_eq!(store.reconciliation_marker("org1").unwrap(), 2);
    }

    #[test]
    fn test_reconcile_page_partial_failure() {
        let (_temp, reconciler) = create_test_reconciler(1709300000);

        let mut malformed = raw("pf-bad", "adoptable");
        malformed.age = Some("puppy".to_string());
        let page = vec![raw("pf-1", "adoptable"), malformed, raw("pf-2", "adoptable")];

        let report = reconciler.reconcile_page(&page);
        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, vec!["pf-bad".to_string()]);

        // Both valid records landed despite the malformed neighbor.
        let store = reconciler.store();
        assert!(store.get_by_source_id("pf-1").unwrap().is_some());
        assert!(store.get_by_source_id("pf-2").unwrap().is_some());
        assert!(store.get_by_source_id("pf-bad").unwrap().is_none());
    }

    #[test]
    fn test_reconcile_observes_transition_at_ingestion_time() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let mut conn = Connection::open(db_path).unwrap();
        run_schema_migrations(&mut conn, "sql").unwrap();
        drop(conn);
        let store = Arc::new(ListingStore::open(db_path).unwrap());

        let first_run = Reconciler::new_with_timestamp_fn(store.clone(), Box::new(|| 1709300000));
        first_run.reconcile_page(&[raw("pf-1", "adoptable")]);

        // A later sync sees the adoption; transition time is ours, not
        // the source's published_at.
        let second_run = Reconciler::new_with_timestamp_fn(store.clone(), Box::new(|| 1709390000));
        let report = second_run.reconcile_page(&[raw("pf-1", "adopted")]);
        assert_eq!(report.applied, 1);

        let listing = store.get_by_source_id("pf-1").unwrap().unwrap();
        assert_eq!(listing.status, ListingStatus::Adopted);
        assert_eq!(listing.status_changed_at, 1709390000);
    }

    #[test]
    fn test_reconcile_discards_stale_replay() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let mut conn = Connection::open(db_path).unwrap();
        run_schema_migrations(&mut conn, "sql").unwrap();
        drop(conn);
        let store = Arc::new(ListingStore::open(db_path).unwrap());

        let current = Reconciler::new_with_timestamp_fn(store.clone(), Box::new(|| 1709390000));
        current.reconcile_page(&[raw("pf-1", "adoptable")]);

        // Replay with a clock behind the stored transition time.
        let stale = Reconciler::new_with_timestamp_fn(store.clone(), Box::new(|| 1709300000));
        let report = stale.reconcile_page(&[raw("pf-1", "adopted")]);

        assert_eq!(report.applied, 0);
        assert_eq!(report.failed, vec!["pf-1".to_string()]);
        let listing = store.get_by_source_id("pf-1").unwrap().unwrap();
        assert_eq!(listing.status, ListingStatus::Adoptable);
    }
}
