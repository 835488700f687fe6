//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.
//! Analysis sections reuse the pipeline's own config types so a settings file
//! and a programmatic `PipelineConfig` can never drift apart.

use serde::{Deserialize, Serialize};

use crate::analysis::{
    BaselineConfig, BatchConfig, DetectionConfig, PipelineConfig, SegmentationConfig,
    ValidationConfig,
};
use crate::calibration::CalibrationOptions;
use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Scan segmentation.
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Baseline estimation.
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Peak detection.
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Peak validation.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Cross-instrument calibration.
    #[serde(default)]
    pub calibration: CalibrationOptions,

    /// Batch processing.
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Settings {
    /// Serialize a single section to TOML.
    pub fn section_to_toml(&self, section: ConfigSection) -> Result<String, toml::ser::Error> {
        match section {
            ConfigSection::Logging => toml::to_string_pretty(&self.logging),
            ConfigSection::Segmentation => toml::to_string_pretty(&self.segmentation),
            ConfigSection::Baseline => toml::to_string_pretty(&self.baseline),
            ConfigSection::Detection => toml::to_string_pretty(&self.detection),
            ConfigSection::Validation => toml::to_string_pretty(&self.validation),
            ConfigSection::Calibration => toml::to_string_pretty(&self.calibration),
            ConfigSection::Batch => toml::to_string_pretty(&self.batch),
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            segmentation: settings.segmentation.clone(),
            baseline: settings.baseline.clone(),
            detection: settings.detection.clone(),
            validation: settings.validation.clone(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Also write a daily rolling log file.
    #[serde(default)]
    pub file_logging: bool,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file_logging: false,
            logs_folder: default_logs_folder(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Logging,
    Segmentation,
    Baseline,
    Detection,
    Validation,
    Calibration,
    Batch,
}

impl ConfigSection {
    /// Every section, in file order.
    pub const ALL: [ConfigSection; 7] = [
        ConfigSection::Logging,
        ConfigSection::Segmentation,
        ConfigSection::Baseline,
        ConfigSection::Detection,
        ConfigSection::Validation,
        ConfigSection::Calibration,
        ConfigSection::Batch,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Logging => "logging",
            ConfigSection::Segmentation => "segmentation",
            ConfigSection::Baseline => "baseline",
            ConfigSection::Detection => "detection",
            ConfigSection::Validation => "validation",
            ConfigSection::Calibration => "calibration",
            ConfigSection::Batch => "batch",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Segmentation => "Sweep segmentation at voltage turning points",
            ConfigSection::Baseline => "Background current estimation per segment",
            ConfigSection::Detection => "Peak detection thresholds and shape measurement",
            ConfigSection::Validation => "Peak filtering, de-duplication and dominant selection",
            ConfigSection::Calibration => "Cross-instrument calibration",
            ConfigSection::Batch => "Parallel batch processing (threads = 0 uses all cores)",
        }
    }

    /// Look up a section by its table name.
    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.table_name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaselineMethod, SmoothingMethod};

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        for section in ConfigSection::ALL {
            assert!(toml.contains(&format!("[{}]", section.table_name())));
        }
        assert!(toml.contains("edge_fraction"));
    }

    #[test]
    fn settings_round_trip() {
        let mut settings = Settings::default();
        settings.detection.smoothing = SmoothingMethod::SavitzkyGolay;
        settings.detection.prominence_override = Some(0.5);
        settings.validation.oxidation_window.min = Some(-0.1);

        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[baseline]\nmethod = \"iterative_exclusion\"\n";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        // Custom value preserved
        assert_eq!(parsed.baseline.method, BaselineMethod::IterativeExclusion);
        // Defaults applied for missing
        assert!((parsed.baseline.edge_fraction - 0.15).abs() < 1e-12);
        assert_eq!(parsed.detection, DetectionConfig::default());
        assert_eq!(parsed.logging.logs_folder, ".logs");
    }

    #[test]
    fn pipeline_config_from_settings() {
        let mut settings = Settings::default();
        settings.validation.dominant_only = true;
        settings.segmentation.min_segment_points = 7;

        let pipeline = PipelineConfig::from(&settings);
        assert!(pipeline.validation.dominant_only);
        assert_eq!(pipeline.segmentation.min_segment_points, 7);
        assert_eq!(pipeline.baseline, settings.baseline);
    }

    #[test]
    fn table_names_round_trip() {
        for section in ConfigSection::ALL {
            assert_eq!(
                ConfigSection::from_table_name(section.table_name()),
                Some(section)
            );
        }
        assert_eq!(ConfigSection::from_table_name("paths"), None);
    }
}
