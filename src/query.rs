//! Query facade
//!
//! The single read interface the API layer calls for computed metrics.
//! Snapshots are cached per `(organization, window)` and keyed by the
//! store's reconciliation marker: any applied write to an organization
//! bumps its marker, so a cached snapshot computed under an older
//! marker is recomputed instead of served. A stale hit is a contract
//! violation here, not a performance detail.

use crate::metrics::engine::compute_snapshot;
use crate::metrics::snapshot::MetricSnapshot;
use crate::metrics::window::MetricsWindow;
use crate::pipeline::store::{ListingStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type CacheKey = (String, i64, i64);

#[derive(Debug, Clone)]
struct CachedSnapshot {
    marker: i64,
    snapshot: MetricSnapshot,
}

/// Marker-revalidated metrics cache over the listing store.
pub struct MetricsQuery {
    store: Arc<ListingStore>,
    cache: Mutex<HashMap<CacheKey, CachedSnapshot>>,

    /// Timestamp function (for testing with mock time)
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl MetricsQuery {
    pub fn new(store: Arc<ListingStore>) -> Self {
        Self::new_with_timestamp_fn(store, Box::new(|| chrono::Utc::now().timestamp()))
    }

    /// Create a facade with a custom timestamp function.
    pub fn new_with_timestamp_fn(
        store: Arc<ListingStore>,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
            now_fn,
        }
    }

    /// Metrics for one organization and window, computed on first
    /// request and cached until the organization's marker moves.
    ///
    /// An organization the store has never seen yields a snapshot with
    /// all-`None` metrics (empty result, not a fault).
    pub fn get_metrics(
        &self,
        organization_id: &str,
        window: &MetricsWindow,
    ) -> Result<MetricSnapshot, StoreError> {
        // Marker first: listings read afterwards are at least as fresh,
        // so the cache can only err toward recomputation.
        let marker = self.store.reconciliation_marker(organization_id)?;
        let key = (organization_id.to_string(), window.start(), window.end());

        {
            let cache = self.cache.lock().unwrap();
            if let Some(hit) = cache.get(&key) {
                if hit.marker == marker {
                    log::debug!(
                        "Cache hit for {} [{}, {})",
                        organization_id,
                        window.start(),
                        window.end()
                    );
                    return Ok(hit.snapshot.clone());
                }
            }
        }

        let listings = self.store.query_window(organization_id, window)?;
        let snapshot = compute_snapshot(organization_id, &listings, window, (self.now_fn)());

        let mut cache = self.cache.lock().unwrap();
        cache.insert(
            key,
            CachedSnapshot {
                marker,
                snapshot: snapshot.clone(),
            },
        );

        Ok(snapshot)
    }

    /// Number of cached windows (all organizations).
    pub fn cached_windows(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reconciler::Reconciler;
    use crate::pipeline::store::run_schema_migrations;
    use crate::pipeline::types::RawListingRecord;
    use rusqlite::Connection;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::NamedTempFile;

    const DAY: i64 = 86_400;

    fn create_test_store() -> (NamedTempFile, Arc<ListingStore>) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let mut conn = Connection::open(&db_path).unwrap();
        run_schema_migrations(&mut conn, "sql").unwrap();
        drop(conn);
        (temp_file, Arc::new(ListingStore::open(&db_path).unwrap()))
    }

    fn raw(source_id: &str, organization_id: &str, status: &str) -> RawListingRecord {
        RawListingRecord {
            source_id: Some(source_id.to_string()),
            organization_id: Some(organization_id.to_string()),
            species: Some("dog".to_string()),
            age: Some("adult".to_string()),
            status: Some(status.to_string()),
            published_at: Some("2024-03-01T00:00:00Z".to_string()),
        }
    }

    /// Facade whose computed_at ticks on every computation, so a cache
    /// hit is distinguishable from a silent recompute.
    fn ticking_query(store: Arc<ListingStore>) -> MetricsQuery {
        let tick = Arc::new(AtomicI64::new(0));
        MetricsQuery::new_with_timestamp_fn(
            store,
            Box::new(move || tick.fetch_add(1, Ordering::SeqCst)),
        )
    }

    #[test]
    fn test_unknown_organization_is_empty_result() {
        let (_temp, store) = create_test_store();
        let query = MetricsQuery::new(store);
        let window = MetricsWindow::new(0, DAY).unwrap();

        let snapshot = query.get_metrics("org-unknown", &window).unwrap();
        assert_eq!(snapshot.organization_id, "org-unknown");
        assert_eq!(snapshot.adoption_rate, None);
        assert_eq!(snapshot.senior_share, None);
        assert_eq!(snapshot.impact_index, None);
    }

    #[test]
    fn test_cache_hit_until_reconciliation() {
        let (_temp, store) = create_test_store();
        let published = 1709251200; // 2024-03-01T00:00:00Z
        let reconciler =
            Reconciler::new_with_timestamp_fn(store.clone(), Box::new(move || published + 100));
        reconciler.reconcile_page(&[raw("pf-1", "org1", "adoptable")]);

        let query = ticking_query(store.clone());
        let window = MetricsWindow::new(published, published + DAY).unwrap();

        let first = query.get_metrics("org1", &window).unwrap();
        let second = query.get_metrics("org1", &window).unwrap();
        // Same computed_at: the second call was a cache hit.
        assert_eq!(first.computed_at, second.computed_at);
        assert_eq!(query.cached_windows(), 1);

        // A status transition bumps the marker and invalidates the entry.
        let later = Reconciler::new_with_timestamp_fn(
            store.clone(),
            Box::new(move || published + 200),
        );
        later.reconcile_page(&[raw("pf-1", "org1", "adopted")]);

        let third = query.get_metrics("org1", &window).unwrap();
        assert_ne!(third.computed_at, second.computed_at);
        assert_eq!(third.adoption_rate, Some(1.0));
    }

    #[test]
    fn test_noop_reconciliation_keeps_cache_warm() {
        let (_temp, store) = create_test_store();
        let published = 1709251200;
        let reconciler =
            Reconciler::new_with_timestamp_fn(store.clone(), Box::new(move || published + 100));
        reconciler.reconcile_page(&[raw("pf-1", "org1", "adoptable")]);

        let query = ticking_query(store.clone());
        let window = MetricsWindow::new(published, published + DAY).unwrap();
        let first = query.get_metrics("org1", &window).unwrap();

        // Re-reconciling the identical page applies nothing.
        reconciler.reconcile_page(&[raw("pf-1", "org1", "adoptable")]);

        let second = query.get_metrics("org1", &window).unwrap();
        assert_eq!(first.computed_at, second.computed_at);
    }

    #[test]
    fn test_invalidation_is_per_organization() {
        let (_temp, store) = create_test_store();
        let published = 1709251200;
        let reconciler =
            Reconciler::new_with_timestamp_fn(store.clone(), Box::new(move || published + 100));
        reconciler.reconcile_page(&[
            raw("pf-a", "org1", "adoptable"),
            raw("pf-b", "org2", "adoptable"),
        ]);

        let query = ticking_query(store.clone());
        let window = MetricsWindow::new(published, published + DAY).unwrap();
        let org1_first = query.get_metrics("org1", &window).unwrap();
        let org2_first = query.get_metrics("org2", &window).unwrap();

        // Touch only org2.
        let later = Reconciler::new_with_timestamp_fn(
            store.clone(),
            Box::new(move || published + 200),
        );
        later.reconcile_page(&[raw("pf-b", "org2", "adopted")]);

        let org1_second = query.get_metrics("org1", &window).unwrap();
        let org2_second = query.get_metrics("org2", &window).unwrap();

        assert_eq!(org1_first.computed_at, org1_second.computed_at);
        assert_ne!(org2_first.computed_at, org2_second.computed_at);
    }

    #[test]
    fn test_windows_cached_independently() {
        let (_temp, store) = create_test_store();
        let published = 1709251200;
        let reconciler =
            Reconciler::new_with_timestamp_fn(store.clone(), Box::new(move || published + 100));
        reconciler.reconcile_page(&[raw("pf-1", "org1", "adoptable")]);

        let query = ticking_query(store);
        let week = MetricsWindow::new(published, published + 7 * DAY).unwrap();
        let month = MetricsWindow::new(published, published + 30 * DAY).unwrap();

        query.get_metrics("org1", &week).unwrap();
        query.get_metrics("org1", &month).unwrap();
        assert_eq!(query.cached_windows(), 2);
    }
}
