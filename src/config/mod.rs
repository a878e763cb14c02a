//! Configuration management for the rating service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values for every rating component.

pub mod app;
pub mod classifier;
pub mod performance;
pub mod rating;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ReplaySettings, ServiceSettings};
pub use classifier::ClassifierConfig;
pub use performance::{PerformanceConfig, PerformanceWeights};
pub use rating::RatingConfig;
