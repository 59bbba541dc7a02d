//! Metric computation over listing windows
//!
//! Pure functions from a slice of listings to the four headline
//! metrics. Nothing here touches the store or the clock; callers pass
//! the window and the listings they queried for it. A zero denominator
//! is a defined "insufficient data" state (`None`), never an error.

use super::snapshot::MetricSnapshot;
use super::window::MetricsWindow;
use crate::pipeline::types::{AgeCategory, Listing, ListingStatus};

/// Weight of the senior-share bonus in the impact index.
const SENIOR_BONUS_WEIGHT: f64 = 0.5;

/// Share of listings published in the window that were adopted in it.
///
/// `None` when nothing was published in the window.
pub fn adoption_rate(listings: &[Listing], window: &MetricsWindow) -> Option<f64> {
    let published = listings
        .iter()
        .filter(|l| window.contains(l.published_at))
        .count();
    if published == 0 {
        return None;
    }

    let adopted = listings
        .iter()
        .filter(|l| l.status == ListingStatus::Adopted && window.contains(l.status_changed_at))
        .count();

    Some(adopted as f64 / published as f64)
}

/// Median seconds from publication to observed adoption, over listings
/// adopted inside the window.
///
/// Never-adopted listings are excluded, not treated as infinite. Even
/// counts average the two middle values.
pub fn median_time_to_adoption_secs(
    listings: &[Listing],
    window: &MetricsWindow,
) -> Option<f64> {
    let mut durations: Vec<i64> = listings
        .iter()
        .filter(|l| window.contains(l.status_changed_at))
        .filter_map(|l| l.time_to_adoption_secs())
        .collect();

    if durations.is_empty() {
        return None;
    }

    durations.sort_unstable();
    let mid = durations.len() / 2;
    if durations.len() % 2 == 1 {
        Some(durations[mid] as f64)
    } else {
        Some((durations[mid - 1] + durations[mid]) as f64 / 2.0)
    }
}

/// Share of listings published in the window that are seniors.
///
/// Same zero-denominator policy as [`adoption_rate`].
pub fn senior_share(listings: &[Listing], window: &MetricsWindow) -> Option<f64> {
    let published: Vec<&Listing> = listings
        .iter()
        .filter(|l| window.contains(l.published_at))
        .collect();
    if published.is_empty() {
        return None;
    }

    let seniors = published
        .iter()
        .filter(|l| l.age_category == AgeCategory::Senior)
        .count();

    Some(seniors as f64 / published.len() as f64)
}

/// Composite impact score in `[0, 100]`.
///
/// `100 * rate * (1 + 0.5 * senior_share) / (1 + median_tta / window)`:
/// rises with the adoption rate, falls as the median time-to-adoption
/// grows relative to the window, and seniors adopted count extra.
/// Unavailable senior share or median contribute nothing; the index is
/// `None` exactly when the adoption rate is.
pub fn impact_index(
    adoption_rate: Option<f64>,
    median_tta_secs: Option<f64>,
    senior_share: Option<f64>,
    window: &MetricsWindow,
) -> Option<f64> {
    let rate = adoption_rate?;
    let senior = senior_share.unwrap_or(0.0);
    let tta_norm = median_tta_secs
        .map(|m| m / window.duration_secs() as f64)
        .unwrap_or(0.0);

    let index = 100.0 * rate * (1.0 + SENIOR_BONUS_WEIGHT * senior) / (1.0 + tta_norm);
    Some(index.clamp(0.0, 100.0))
}

/// Compute all four metrics into a snapshot.
pub fn compute_snapshot(
    organization_id: &str,
    listings: &[Listing],
    window: &MetricsWindow,
    computed_at: i64,
) -> MetricSnapshot {
    let rate = adoption_rate(listings, window);
    let median = median_time_to_adoption_secs(listings, window);
    let seniors = senior_share(listings, window);
    let index = impact_index(rate, median, seniors, window);

    MetricSnapshot {
        organization_id: organization_id.to_string(),
        window_start: window.start(),
        window_end: window.end(),
        adoption_rate: rate,
        median_time_to_adoption_secs: median,
        senior_share: seniors,
        impact_index: index,
        computed_at,
    }
}
