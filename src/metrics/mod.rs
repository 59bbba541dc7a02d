//! Metrics engine
//!
//! Pure computation of the four headline metrics (adoption rate, median
//! time-to-adoption, senior share, impact index) over a listing window.
//! No metric is authoritative state; everything here recomputes from
//! whatever the listing store returns for the window.
//!
//! ## Module Organization
//!
//! - `window` - Half-open `[start, end)` interval type
//! - `engine` - The metric functions and snapshot assembly
//! - `snapshot` - Serializable computed result

pub mod engine;
pub mod snapshot;
pub mod window;

pub use engine::{
    adoption_rate, compute_snapshot, impact_index, median_time_to_adoption_secs, senior_share,
};
pub use snapshot::MetricSnapshot;
pub use window::MetricsWindow;
