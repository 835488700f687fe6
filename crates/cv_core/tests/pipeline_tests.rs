//! End-to-end tests over synthetic voltammograms.

use cv_core::analysis::{
    detect, process_batch, summarize, AnalysisError, BaselineIssue, BatchError, PipelineConfig,
};
use cv_core::calibration::{align, CalibrationRegistry, Calibrator};
use cv_core::config::Settings;
use cv_core::models::{
    AlignmentPolicy, CalibrationQuality, CurrentUnit, CvTrace, PeakType, SweepDirection,
    TraceMetadata,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn gaussian(x: f64, center: f64, sigma: f64) -> f64 {
    (-(x - center).powi(2) / (2.0 * sigma * sigma)).exp()
}

/// One cycle from -0.2 V to 0.5 V and back in 2 mV steps over a 1 µA background.
///
/// `bumps` are `(amplitude, center, sigma)` on the forward sweep, `dips` the
/// same on the reverse sweep (amplitude is subtracted).
fn cycle(id: &str, bumps: &[(f64, f64, f64)], dips: &[(f64, f64, f64)]) -> CvTrace {
    let forward: Vec<f64> = (0..=350).map(|i| -0.2 + i as f64 * 0.002).collect();
    let reverse: Vec<f64> = (1..=350).map(|i| 0.5 - i as f64 * 0.002).collect();

    let shape = |v: f64, terms: &[(f64, f64, f64)]| -> f64 {
        terms.iter().map(|&(a, c, s)| a * gaussian(v, c, s)).sum()
    };

    let mut voltage = forward.clone();
    let mut current: Vec<f64> = forward.iter().map(|&v| 1.0 + shape(v, bumps)).collect();
    voltage.extend(&reverse);
    current.extend(reverse.iter().map(|&v| 1.0 - shape(v, dips)));

    CvTrace::new(voltage, current, TraceMetadata::new(id, "potentiostat-a")).unwrap()
}

/// Bump to 5 µA at +0.15 V forward, dip to -3 µA at +0.05 V reverse.
fn redox_couple(id: &str) -> CvTrace {
    cycle(id, &[(4.0, 0.15, 0.03)], &[(4.0, 0.05, 0.03)])
}

/// `cycles` back-to-back copies of the redox couple in one trace.
fn repeated_couple(id: &str, cycles: usize) -> CvTrace {
    let single = redox_couple(id);
    let mut voltage = single.voltage.clone();
    let mut current = single.current.clone();
    for _ in 1..cycles {
        // Each cycle restarts from the shared -0.2 V vertex
        voltage.extend(&single.voltage[1..]);
        current.extend(&single.current[1..]);
    }
    CvTrace::new(voltage, current, TraceMetadata::new(id, "potentiostat-a")).unwrap()
}

/// Add seeded Gaussian noise (Box-Muller) with standard deviation `sigma`.
fn with_noise(trace: &CvTrace, sigma: f64, seed: u64) -> CvTrace {
    let mut rng = StdRng::seed_from_u64(seed);
    let noisy = trace
        .current
        .iter()
        .map(|&c| {
            let u1: f64 = 1.0 - rng.gen::<f64>();
            let u2: f64 = rng.gen();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            c + sigma * z
        })
        .collect();
    trace.with_current(noisy)
}

#[test]
fn synthetic_couple_yields_one_peak_per_polarity() {
    let trace = redox_couple("couple");

    for strategy in ["prominence", "derivative", "gaussian"] {
        let result = detect(&trace, strategy, &PipelineConfig::default()).unwrap();

        let ox: Vec<_> = result.peaks_of_type(PeakType::Oxidation).collect();
        let red: Vec<_> = result.peaks_of_type(PeakType::Reduction).collect();
        assert_eq!(ox.len(), 1, "{}: {:?}", strategy, result.peaks);
        assert_eq!(red.len(), 1, "{}: {:?}", strategy, result.peaks);

        assert!((ox[0].voltage - 0.15).abs() < 0.005, "{}", strategy);
        assert!((red[0].voltage - 0.05).abs() < 0.005, "{}", strategy);
        assert!((ox[0].height - 4.0).abs() < 0.05, "{}: {}", strategy, ox[0].height);
        assert!((red[0].height - 4.0).abs() < 0.05, "{}: {}", strategy, red[0].height);
        assert!(ox[0].confidence >= 20.0 && ox[0].confidence <= 100.0);
    }
}

#[test]
fn noisy_couple_yields_one_peak_per_polarity() {
    let clean = redox_couple("noisy");

    for seed in [3, 11, 42] {
        let trace = with_noise(&clean, 0.07, seed);
        for strategy in ["prominence", "derivative", "gaussian"] {
            let result = detect(&trace, strategy, &PipelineConfig::default()).unwrap();

            let ox: Vec<_> = result.peaks_of_type(PeakType::Oxidation).collect();
            let red: Vec<_> = result.peaks_of_type(PeakType::Reduction).collect();
            assert_eq!(ox.len(), 1, "{} seed {}: {:?}", strategy, seed, result.peaks);
            assert_eq!(red.len(), 1, "{} seed {}: {:?}", strategy, seed, result.peaks);

            assert!((ox[0].voltage - 0.15).abs() < 0.01, "{} seed {}", strategy, seed);
            assert!((red[0].voltage - 0.05).abs() < 0.01, "{} seed {}", strategy, seed);
            assert!((ox[0].height - 4.0).abs() < 0.3, "{}: {}", strategy, ox[0].height);
            assert!((red[0].height - 4.0).abs() < 0.3, "{}: {}", strategy, red[0].height);
            assert!(ox[0].confidence > 90.0, "{}: {}", strategy, ox[0].confidence);
        }
    }
}

#[test]
fn every_cycle_keeps_its_own_peaks() {
    let trace = repeated_couple("three-cycles", 3);

    for strategy in ["prominence", "derivative", "gaussian"] {
        let result = detect(&trace, strategy, &PipelineConfig::default()).unwrap();
        assert_eq!(result.segments.len(), 6);

        for (segment_index, segment) in result.segments.iter().enumerate() {
            let expected = match segment.direction {
                SweepDirection::Forward => PeakType::Oxidation,
                SweepDirection::Reverse => PeakType::Reduction,
            };
            let in_segment: Vec<_> = result
                .peaks
                .iter()
                .filter(|p| p.segment_index == segment_index)
                .collect();
            assert_eq!(
                in_segment.len(),
                1,
                "{} cycle {}: {:?}",
                strategy,
                segment.cycle,
                in_segment
            );
            assert_eq!(in_segment[0].peak_type, expected);
        }

        assert_eq!(result.peaks_of_type(PeakType::Oxidation).count(), 3);
        assert_eq!(result.peaks_of_type(PeakType::Reduction).count(), 3);
    }
}

#[test]
fn segmentation_partitions_and_baselines_cover_segments() {
    let trace = redox_couple("couple");
    let result = detect(&trace, "prominence", &PipelineConfig::default()).unwrap();

    assert_eq!(result.segments.first().unwrap().start_index, 0);
    assert_eq!(result.segments.last().unwrap().end_index, trace.len());
    for pair in result.segments.windows(2) {
        assert_eq!(pair[1].start_index, pair[0].end_index - 1);
    }

    assert_eq!(result.baselines.len(), result.segments.len());
    for (segment, baseline) in result.segments.iter().zip(&result.baselines) {
        assert_eq!(baseline.current_at_index.len(), segment.len());
        assert!(baseline.issue.is_none());
    }
    // Forward edges are flat background
    assert!(result.baselines[0].quality_r2 > 0.9);
}

#[test]
fn summary_reports_reversible_couple() {
    let result = detect(&redox_couple("couple"), "gaussian", &PipelineConfig::default()).unwrap();
    let summary = summarize(&result);

    assert!(summary.has_pair());
    assert!((summary.peak_separation_v.unwrap() - 0.10).abs() < 0.01);
    assert!((summary.formal_potential_v.unwrap() - 0.10).abs() < 0.01);
    assert!((summary.current_ratio.unwrap() - 1.0).abs() < 0.05);
}

#[test]
fn detection_is_idempotent() {
    let trace = redox_couple("couple");
    let config = PipelineConfig::default();
    for strategy in ["prominence", "derivative", "gaussian"] {
        assert_eq!(
            detect(&trace, strategy, &config).unwrap(),
            detect(&trace, strategy, &config).unwrap()
        );
    }
}

#[test]
fn unknown_strategy_is_hard_error() {
    let err = detect(&redox_couple("c"), "fft", &PipelineConfig::default()).unwrap_err();
    assert_eq!(err, AnalysisError::UnknownStrategy("fft".to_string()));

    // Aliases resolve to canonical names
    let result = detect(&redox_couple("c"), "Model-Assisted", &PipelineConfig::default()).unwrap();
    assert_eq!(result.strategy, "gaussian");
}

#[test]
fn dominant_only_keeps_largest_of_each_polarity() {
    let trace = cycle(
        "multi",
        &[(3.0, 0.05, 0.02), (9.0, 0.25, 0.02)],
        &[(2.0, 0.2, 0.02), (7.0, 0.0, 0.02)],
    );

    let mut settings = Settings::default();
    settings.validation.dominant_only = true;
    let config = PipelineConfig::from(&settings);

    let result = detect(&trace, "prominence", &config).unwrap();
    assert_eq!(result.peaks.len(), 4, "{:?}", result.peaks);

    let enabled: Vec<_> = result.enabled_peaks().collect();
    assert_eq!(enabled.len(), 2);
    let ox = enabled.iter().find(|p| p.peak_type == PeakType::Oxidation).unwrap();
    let red = enabled.iter().find(|p| p.peak_type == PeakType::Reduction).unwrap();
    assert!((ox.height - 9.0).abs() < 0.1);
    assert!((red.height - 7.0).abs() < 0.1);

    // Output ordered by voltage
    for pair in result.peaks.windows(2) {
        assert!(pair[0].voltage <= pair[1].voltage);
    }
}

#[test]
fn currents_in_wrong_unit_give_suspect_baselines() {
    let trace = redox_couple("amps");
    // Amperes passed through as if they were µA
    let raw_amps: Vec<f64> = trace.current.iter().map(|c| c * 1e-6).collect();
    let mislabelled = trace.with_current(raw_amps.clone());

    let config = PipelineConfig::default();
    let result = detect(&mislabelled, "prominence", &config).unwrap();
    for baseline in &result.baselines {
        assert!(baseline.is_suspect(config.baseline.suspect_r2));
        assert_eq!(baseline.issue, Some(BaselineIssue::CurrentMagnitude));
    }

    // Scaling with the loader table restores healthy baselines
    let unit = CurrentUnit::from_label("A").unwrap();
    let scaled = trace.with_current(unit.scale_to_microamps(&raw_amps));
    let result = detect(&scaled, "prominence", &config).unwrap();
    assert!(result.baselines.iter().all(|b| b.issue.is_none()));
    assert!(!result.baselines[0].is_suspect(config.baseline.suspect_r2));
}

#[test]
fn batch_isolates_failures_and_keeps_order() {
    let mut traces: Vec<CvTrace> = (0..6).map(|i| redox_couple(&format!("s{}", i))).collect();
    // Break one trace after construction
    traces[3].current.truncate(10);

    let report = process_batch(&traces, "prominence", &PipelineConfig::default(), 3).unwrap();

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 1);
    for (i, outcome) in report.outcomes.iter().enumerate() {
        assert_eq!(outcome.index, i);
        assert_eq!(outcome.trace_id, format!("s{}", i));
    }

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.trace_id, "s3");
    assert!(failure.result.is_none());
    assert!(failure.error.as_deref().unwrap().contains("Invalid trace"));

    // Parallel results equal sequential ones
    let sequential = detect(&traces[0], "prominence", &PipelineConfig::default()).unwrap();
    assert_eq!(report.outcomes[0].result.as_ref(), Some(&sequential));
}

#[test]
fn batch_with_unknown_strategy_fails_fast() {
    let traces = vec![redox_couple("s0")];
    let err = process_batch(&traces, "wavelet", &PipelineConfig::default(), 1).unwrap_err();
    assert!(matches!(
        err,
        BatchError::Analysis(AnalysisError::UnknownStrategy(_))
    ));
}

#[test]
fn calibration_round_trip_through_registry() {
    let reference = redox_couple("ref-sample");
    let target_current: Vec<f64> = reference.current.iter().map(|c| c * 1.2 + 0.3).collect();
    let mut target = reference.with_current(target_current);
    target.metadata.instrument_id = "potentiostat-b".to_string();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibrations.json");

    let registry = CalibrationRegistry::new();
    let calibrator = Calibrator::default();
    let model = calibrator
        .fit_and_store(&registry, &reference, &target, "ferrocene")
        .unwrap();

    assert!((model.current_slope - 1.2).abs() < 1e-9);
    assert!((model.current_offset - 0.3).abs() < 1e-9);
    assert!(model.r2 > 0.999_999);
    assert_eq!(model.quality, CalibrationQuality::Excellent);

    registry.save(&path).unwrap();
    let reloaded = CalibrationRegistry::load(&path).unwrap();
    let stored = reloaded.get(&model.key).unwrap();

    let corrected = calibrator.apply(&stored, &target);
    assert_eq!(corrected.metadata.instrument_id, "potentiostat-a");
    for (c, r) in corrected.current.iter().zip(&reference.current) {
        assert!((c - r).abs() < 1e-9);
    }

    // Corrected trace analyzes like the reference
    let a = detect(&reference, "prominence", &PipelineConfig::default()).unwrap();
    let b = detect(&corrected, "prominence", &PipelineConfig::default()).unwrap();
    assert_eq!(a.peaks.len(), b.peaks.len());
}

#[test]
fn truncation_alignment_uses_shorter_length() {
    let make = |n: usize, id: &str| {
        let voltage: Vec<f64> = (0..n).map(|i| i as f64 * 0.01).collect();
        let current: Vec<f64> = (0..n).map(|i| 1.0 + (i as f64 * 0.1).sin()).collect();
        CvTrace::new(voltage, current, TraceMetadata::new(id, id)).unwrap()
    };
    let reference = make(100, "ref");
    let target = make(80, "tgt");

    let aligned = align(&reference, &target, AlignmentPolicy::Truncate);
    assert_eq!(aligned.len(), 80);
    assert_eq!(aligned.reference_current.len(), 80);
    assert_eq!(aligned.target_current.len(), 80);

    let model = Calibrator::default().fit(&reference, &target, "cond").unwrap();
    assert_eq!(model.aligned_points, 80);
}
