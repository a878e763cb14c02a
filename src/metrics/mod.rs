//! Metrics for the rating service
//!
//! Prometheus counters and histograms for match processing, rating
//! computation and replay passes.

pub mod collector;

pub use collector::{MatchMetrics, MetricsCollector, MetricsTimer, RatingMetrics, ReplayMetrics};
