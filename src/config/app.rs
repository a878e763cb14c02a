//! Main application configuration
//!
//! This module defines the primary configuration structures for the rating
//! service, including environment variable and TOML file loading and validation.

use crate::config::{ClassifierConfig, PerformanceConfig, RatingConfig};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub rating: RatingConfig,
    pub performance: PerformanceConfig,
    pub classifier: ClassifierConfig,
    pub replay: ReplaySettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Capacity of the live ingestion queue
    pub live_queue_capacity: usize,
}

/// Historical replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Number of stabilization passes over the archive
    pub passes: u32,
    /// Share of the previous pass's rating carried into the next pass's seed (0.0 to 1.0)
    pub carryover_weight: f64,
    /// Replay independent modes on a thread pool
    pub parallel_modes: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "bedwars-rating".to_string(),
            log_level: "info".to_string(),
            live_queue_capacity: 1024,
        }
    }
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            passes: 1,
            carryover_weight: 0.5,
            parallel_modes: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env_overrides()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(capacity) = env::var("LIVE_QUEUE_CAPACITY") {
            self.service.live_queue_capacity = capacity
                .parse()
                .map_err(|_| anyhow!("Invalid LIVE_QUEUE_CAPACITY value: {}", capacity))?;
        }

        // Rating settings
        if let Ok(initial) = env::var("RATING_INITIAL") {
            self.rating.initial_rating = initial
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_INITIAL value: {}", initial))?;
        }
        if let Ok(legacy) = env::var("RATING_LEGACY_INITIAL") {
            self.rating.legacy_initial_rating = legacy
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_LEGACY_INITIAL value: {}", legacy))?;
        }
        if let Ok(k_factor) = env::var("RATING_K_FACTOR") {
            self.rating.k_factor = k_factor
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_K_FACTOR value: {}", k_factor))?;
        }
        if let Ok(k_factor) = env::var("RATING_MEGA_K_FACTOR") {
            self.rating.mega_k_factor = k_factor
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_MEGA_K_FACTOR value: {}", k_factor))?;
        }
        if let Ok(divisor) = env::var("RATING_DIVISOR") {
            self.rating.divisor = divisor
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_DIVISOR value: {}", divisor))?;
        }
        if let Ok(allow_equal) = env::var("RATING_ALLOW_EQUAL_TIMESTAMPS") {
            self.rating.allow_equal_timestamps = allow_equal.parse().map_err(|_| {
                anyhow!("Invalid RATING_ALLOW_EQUAL_TIMESTAMPS value: {}", allow_equal)
            })?;
        }

        // Classifier settings
        if let Ok(duration) = env::var("CLASSIFIER_MIN_DURATION_SECONDS") {
            self.classifier.min_duration_seconds = duration.parse().map_err(|_| {
                anyhow!("Invalid CLASSIFIER_MIN_DURATION_SECONDS value: {}", duration)
            })?;
        }

        // Replay settings
        if let Ok(passes) = env::var("REPLAY_PASSES") {
            self.replay.passes = passes
                .parse()
                .map_err(|_| anyhow!("Invalid REPLAY_PASSES value: {}", passes))?;
        }
        if let Ok(weight) = env::var("REPLAY_CARRYOVER_WEIGHT") {
            self.replay.carryover_weight = weight
                .parse()
                .map_err(|_| anyhow!("Invalid REPLAY_CARRYOVER_WEIGHT value: {}", weight))?;
        }
        if let Ok(parallel) = env::var("REPLAY_PARALLEL_MODES") {
            self.replay.parallel_modes = parallel
                .parse()
                .map_err(|_| anyhow!("Invalid REPLAY_PARALLEL_MODES value: {}", parallel))?;
        }

        Ok(())
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.live_queue_capacity == 0 {
        return Err(anyhow!("Live queue capacity must be greater than 0"));
    }

    // Validate replay settings
    if config.replay.passes == 0 {
        return Err(anyhow!("Replay passes must be greater than 0"));
    }
    if !(0.0..=1.0).contains(&config.replay.carryover_weight) {
        return Err(anyhow!("Replay carryover weight must be within 0.0 and 1.0"));
    }

    config.rating.validate()?;
    config.performance.validate()?;
    config.classifier.validate()?;

    Ok(())
}
