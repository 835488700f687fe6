//! Detection pipeline: segmentation, baselines, detection and validation.
//!
//! The stages always run in this order. Strategy selection only swaps the
//! detector; no strategy can skip baseline computation.

use serde::{Deserialize, Serialize};

use crate::models::CvTrace;

use super::baseline::{fit_all_baselines, BaselineConfig};
use super::detectors::{create_detector, DetectionConfig, PeakDetector};
use super::segmentation::{segment, SegmentationConfig};
use super::types::{AnalysisError, AnalysisResult, DetectionResult};
use super::validation::{validate, ValidationConfig};

/// Configuration for every pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scan segmentation.
    pub segmentation: SegmentationConfig,
    /// Baseline estimation.
    pub baseline: BaselineConfig,
    /// Peak detection.
    pub detection: DetectionConfig,
    /// Peak validation.
    pub validation: ValidationConfig,
}

/// Run the full pipeline with a strategy chosen by name.
///
/// Names are case-insensitive and accept aliases; an unknown name is an
/// `UnknownStrategy` error.
pub fn detect(
    trace: &CvTrace,
    strategy_name: &str,
    config: &PipelineConfig,
) -> AnalysisResult<DetectionResult> {
    let detector = create_detector(strategy_name)
        .ok_or_else(|| AnalysisError::UnknownStrategy(strategy_name.to_string()))?;
    detect_with(trace, detector.as_ref(), config)
}

/// Run the full pipeline with a given detector.
pub fn detect_with(
    trace: &CvTrace,
    detector: &dyn PeakDetector,
    config: &PipelineConfig,
) -> AnalysisResult<DetectionResult> {
    trace.validate()?;

    let name = trace.metadata.display_name();
    tracing::debug!(
        "Analyzing '{}' ({} points) with {} strategy",
        name,
        trace.len(),
        detector.name()
    );

    // 1. Segmentation
    let segments = segment(trace, &config.segmentation)?;
    tracing::debug!("'{}': {} segment(s)", name, segments.len());

    // 2. Baselines
    let baselines = fit_all_baselines(trace, &segments, &config.baseline);
    for (i, baseline) in baselines.iter().enumerate() {
        if baseline.is_suspect(config.baseline.suspect_r2) {
            tracing::warn!(
                "'{}': segment {} baseline is suspect (R²={:.3}{})",
                name,
                i,
                baseline.quality_r2,
                baseline
                    .issue
                    .map(|issue| format!(", {}", issue))
                    .unwrap_or_default()
            );
        }
    }

    // 3. Detection
    let candidates: Vec<_> = segments
        .iter()
        .zip(&baselines)
        .enumerate()
        .flat_map(|(i, (segment, baseline))| {
            detector.detect(trace, segment, i, baseline, &config.detection)
        })
        .collect();

    // 4. Validation
    let peaks = validate(candidates, &config.validation);

    tracing::debug!(
        "'{}': {} peak(s), {} enabled",
        name,
        peaks.len(),
        peaks.iter().filter(|p| p.enabled).count()
    );

    Ok(DetectionResult {
        sample_id: trace.metadata.sample_id.clone(),
        strategy: detector.name().to_string(),
        segments,
        baselines,
        peaks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeakType, TraceMetadata};

    fn gaussian(x: f64, center: f64, sigma: f64) -> f64 {
        (-(x - center).powi(2) / (2.0 * sigma * sigma)).exp()
    }

    fn one_cycle() -> CvTrace {
        let forward: Vec<f64> = (0..=350).map(|i| -0.2 + i as f64 * 0.002).collect();
        let reverse: Vec<f64> = (1..=350).map(|i| 0.5 - i as f64 * 0.002).collect();

        let mut voltage = forward.clone();
        let mut current: Vec<f64> = forward
            .iter()
            .map(|&v| 1.0 + 4.0 * gaussian(v, 0.15, 0.03))
            .collect();
        voltage.extend(&reverse);
        current.extend(reverse.iter().map(|&v| 1.0 - 4.0 * gaussian(v, 0.05, 0.03)));

        CvTrace::new(voltage, current, TraceMetadata::new("cycle", "inst")).unwrap()
    }

    #[test]
    fn unknown_strategy_is_error() {
        let err = detect(&one_cycle(), "wavelet", &PipelineConfig::default()).unwrap_err();
        assert_eq!(err, AnalysisError::UnknownStrategy("wavelet".to_string()));
    }

    #[test]
    fn every_strategy_finds_the_redox_pair() {
        let trace = one_cycle();
        for name in ["prominence", "derivative", "gaussian"] {
            let result = detect(&trace, name, &PipelineConfig::default()).unwrap();
            assert_eq!(result.strategy, name);
            assert_eq!(result.segments.len(), 2);
            assert_eq!(result.baselines.len(), 2);

            let ox: Vec<_> = result.peaks_of_type(PeakType::Oxidation).collect();
            let red: Vec<_> = result.peaks_of_type(PeakType::Reduction).collect();
            assert_eq!(ox.len(), 1, "{}: {:?}", name, result.peaks);
            assert_eq!(red.len(), 1, "{}: {:?}", name, result.peaks);
            assert!((ox[0].voltage - 0.15).abs() < 0.005);
            assert!((red[0].voltage - 0.05).abs() < 0.005);
            assert_eq!(ox[0].segment_index, 0);
            assert_eq!(red[0].segment_index, 1);
        }
    }

    #[test]
    fn baselines_match_segment_lengths() {
        let result = detect(&one_cycle(), "prominence", &PipelineConfig::default()).unwrap();
        for (segment, baseline) in result.segments.iter().zip(&result.baselines) {
            assert_eq!(segment.len(), baseline.len());
        }
    }

    #[test]
    fn detection_is_deterministic() {
        let trace = one_cycle();
        let config = PipelineConfig::default();
        let first = detect(&trace, "gaussian", &config).unwrap();
        let second = detect(&trace, "gaussian", &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_trace_is_rejected() {
        let mut trace = one_cycle();
        trace.current.pop();
        let err = detect(&trace, "prominence", &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidTrace(_)));
    }
}
