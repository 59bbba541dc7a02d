//! Computed metric snapshots

use serde::{Deserialize, Serialize};

/// One computed metrics result for an organization and window.
///
/// Derived data, never authoritative: always reproducible from the
/// listing store as of `computed_at`. `None` metrics serialize as JSON
/// `null` and mean "insufficient data", not zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub organization_id: String,
    pub window_start: i64,
    pub window_end: i64,
    pub adoption_rate: Option<f64>,
    pub median_time_to_adoption_secs: Option<f64>,
    pub senior_share: Option<f64>,
    pub impact_index: Option<f64>,
    pub computed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_metrics_serialize_as_null() {
        let snapshot = MetricSnapshot {
            organization_id: "org1".to_string(),
            window_start: 100,
            window_end: 200,
            adoption_rate: None,
            median_time_to_adoption_secs: None,
            senior_share: None,
            impact_index: None,
            computed_at: 300,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["adoption_rate"].is_null());
        assert!(json["impact_index"].is_null());
        assert_eq!(json["organization_id"], "org1");

        let back: MetricSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
