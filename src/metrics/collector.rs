//! Metrics collection using Prometheus
//!
//! Counters for match outcomes and rejections, plus timing of the rating
//! computation and of replay passes.

use crate::types::Mode;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the rating service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Match-level metrics
    match_metrics: MatchMetrics,

    /// Rating computation metrics
    rating_metrics: RatingMetrics,

    /// Replay metrics
    replay_metrics: ReplayMetrics,
}

/// Match-level metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches submitted, by apply outcome
    pub processed_total: IntCounterVec,

    /// Invalid matches, by rejection reason
    pub rejected_total: IntCounterVec,

    /// Applied matches, by rating pool
    pub applied_total: IntCounterVec,

    /// Ledger applies that failed
    pub storage_failures_total: IntCounter,
}

/// Rating computation metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Rating calculation time
    pub rating_calculation_duration: Histogram,

    /// Matches that needed the zero-sum correction
    pub zero_sum_corrections_total: IntCounter,

    /// Absolute per-player rating change, by mode
    pub rating_delta_abs: HistogramVec,

    /// Rated players per mode
    pub rated_players: IntGaugeVec,
}

/// Replay metrics
#[derive(Clone)]
pub struct ReplayMetrics {
    /// Completed replay passes
    pub passes_total: IntCounter,

    /// Wall time of one replay pass
    pub pass_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let match_metrics = MatchMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;
        let replay_metrics = ReplayMetrics::new(&registry)?;

        Ok(Self {
            registry,
            match_metrics,
            rating_metrics,
            replay_metrics,
        })
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    pub fn replay(&self) -> &ReplayMetrics {
        &self.replay_metrics
    }

    /// Record the outcome of one submitted match
    pub fn record_outcome(&self, outcome: &str) {
        self.match_metrics
            .processed_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record an invalid match
    pub fn record_rejection(&self, reason: &str) {
        self.match_metrics
            .rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record an applied match and the size of each player's change
    pub fn record_applied(&self, mode: Mode, deltas: impl IntoIterator<Item = f64>) {
        let mode_str = mode.to_string();

        self.match_metrics
            .applied_total
            .with_label_values(&[&mode_str])
            .inc();

        let histogram = self
            .rating_metrics
            .rating_delta_abs
            .with_label_values(&[&mode_str]);
        for delta in deltas {
            histogram.observe(delta.abs());
        }
    }

    pub fn record_storage_failure(&self) {
        self.match_metrics.storage_failures_total.inc();
    }

    /// Record rating calculation duration
    pub fn record_rating_calculation(&self, duration: Duration, corrected: bool) {
        self.rating_metrics
            .rating_calculation_duration
            .observe(duration.as_secs_f64());

        if corrected {
            self.rating_metrics.zero_sum_corrections_total.inc();
        }
    }

    /// Update the rated player gauge of a mode
    pub fn set_rated_players(&self, mode: Mode, count: usize) {
        self.rating_metrics
            .rated_players
            .with_label_values(&[&mode.to_string()])
            .set(count as i64);
    }

    pub fn record_replay_pass(&self, duration: Duration) {
        self.replay_metrics.passes_total.inc();
        self.replay_metrics
            .pass_duration
            .observe(duration.as_secs_f64());
    }

    /// Render every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let processed_total = IntCounterVec::new(
            Opts::new(
                "bedwars_rating_matches_processed_total",
                "Matches submitted for rating, by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(processed_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new(
                "bedwars_rating_matches_rejected_total",
                "Invalid matches, by rejection reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let applied_total = IntCounterVec::new(
            Opts::new(
                "bedwars_rating_matches_applied_total",
                "Matches applied to the ledger, by mode",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(applied_total.clone()))?;

        let storage_failures_total = IntCounter::new(
            "bedwars_rating_storage_failures_total",
            "Ledger applies that failed",
        )?;
        registry.register(Box::new(storage_failures_total.clone()))?;

        Ok(Self {
            processed_total,
            rejected_total,
            applied_total,
            storage_failures_total,
        })
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_calculation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bedwars_rating_calculation_duration_seconds",
                "Time spent scoring a match and computing its rating deltas",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        let zero_sum_corrections_total = IntCounter::new(
            "bedwars_rating_zero_sum_corrections_total",
            "Matches whose deltas needed the zero-sum correction",
        )?;
        registry.register(Box::new(zero_sum_corrections_total.clone()))?;

        let rating_delta_abs = HistogramVec::new(
            HistogramOpts::new(
                "bedwars_rating_delta_abs",
                "Absolute per-player rating change",
            )
            .buckets(vec![1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 40.0, 60.0]),
            &["mode"],
        )?;
        registry.register(Box::new(rating_delta_abs.clone()))?;

        let rated_players = IntGaugeVec::new(
            Opts::new("bedwars_rating_rated_players", "Rated players per mode"),
            &["mode"],
        )?;
        registry.register(Box::new(rated_players.clone()))?;

        Ok(Self {
            rating_calculation_duration,
            zero_sum_corrections_total,
            rating_delta_abs,
            rated_players,
        })
    }
}

impl ReplayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let passes_total = IntCounter::new(
            "bedwars_rating_replay_passes_total",
            "Completed replay passes",
        )?;
        registry.register(Box::new(passes_total.clone()))?;

        let pass_duration = Histogram::with_opts(
            HistogramOpts::new(
                "bedwars_rating_replay_pass_duration_seconds",
                "Wall time of one replay pass",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        )?;
        registry.register(Box::new(pass_duration.clone()))?;

        Ok(Self {
            passes_total,
            pass_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        // Test that we can access all metric groups
        let _matches = collector.matches();
        let _rating = collector.rating();
        let _replay = collector.replay();
    }

    #[test]
    fn test_outcome_and_rejection_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_outcome("applied");
        collector.record_outcome("applied");
        collector.record_outcome("invalid");
        collector.record_rejection("blocked_lobby");

        assert_eq!(
            collector
                .matches()
                .processed_total
                .with_label_values(&["applied"])
                .get(),
            2
        );
        assert_eq!(
            collector
                .matches()
                .rejected_total
                .with_label_values(&["blocked_lobby"])
                .get(),
            1
        );
    }

    #[test]
    fn test_rating_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_applied(Mode::Duo, vec![20.0, -20.0]);
        collector.record_rating_calculation(Duration::from_micros(50), true);
        collector.record_rating_calculation(Duration::from_micros(40), false);
        collector.set_rated_players(Mode::Duo, 4);

        assert_eq!(collector.rating().zero_sum_corrections_total.get(), 1);
        assert_eq!(
            collector
                .rating()
                .rating_delta_abs
                .with_label_values(&["Duo"])
                .get_sample_count(),
            2
        );
        assert_eq!(
            collector
                .rating()
                .rated_players
                .with_label_values(&["Duo"])
                .get(),
            4
        );
    }

    #[test]
    fn test_gather_text() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.record_outcome("applied");
        collector.record_replay_pass(Duration::from_millis(5));

        let text = collector.gather_text().unwrap();
        assert!(text.contains("bedwars_rating_matches_processed_total"));
        assert!(text.contains("bedwars_rating_replay_passes_total 1"));
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();
        assert!(duration >= Duration::from_millis(10));
        assert!(timer.stop() >= duration);
    }
}
