//! Configuration management for CV analysis.
//!
//! This module provides:
//! - TOML-based configuration with one section per pipeline stage
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use cv_core::analysis::PipelineConfig;
//! use cv_core::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/cv_settings.toml");
//! config.load_or_create().unwrap();
//!
//! // Build the pipeline config from the file
//! let pipeline = PipelineConfig::from(config.settings());
//!
//! // Modify a setting
//! config.settings_mut().validation.dominant_only = true;
//!
//! // Save just the validation section atomically
//! config.update_section(ConfigSection::Validation).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{ConfigSection, LoggingSettings, Settings};
