//! Parallel batch processing of many traces.
//!
//! Each trace runs through the pipeline independently on a dedicated rayon
//! pool. One trace failing never aborts the batch; every input produces a
//! `TraceOutcome` and outcomes come back in input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::CvTrace;

use super::detectors::{create_detector, PeakDetector};
use super::pipeline::{detect_with, PipelineConfig};
use super::types::{AnalysisError, DetectionResult};

/// Configuration for batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads (0 = one per logical CPU).
    pub threads: usize,
    /// Strategy name used when none is given explicitly.
    pub strategy: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            strategy: "prominence".to_string(),
        }
    }
}

/// Errors that prevent a batch from starting.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Strategy could not be resolved.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Result of processing a single trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceOutcome {
    /// Position of the trace in the input.
    pub index: usize,
    /// Sample identifier of the trace.
    pub trace_id: String,
    /// Source file name, if known.
    pub source_name: Option<String>,
    /// Whether the pipeline completed.
    pub success: bool,
    /// Detection result (if successful).
    pub result: Option<DetectionResult>,
    /// Failure reason (if failed).
    pub error: Option<String>,
}

impl TraceOutcome {
    /// Create a successful outcome.
    pub fn success(index: usize, trace: &CvTrace, result: DetectionResult) -> Self {
        Self {
            index,
            trace_id: trace.metadata.sample_id.clone(),
            source_name: trace.metadata.source_name.clone(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Create a failed outcome.
    pub fn failure(index: usize, trace: &CvTrace, error: impl Into<String>) -> Self {
        Self {
            index,
            trace_id: trace.metadata.sample_id.clone(),
            source_name: trace.metadata.source_name.clone(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One outcome per input trace.
    pub outcomes: Vec<TraceOutcome>,
}

impl BatchReport {
    /// Number of traces that completed.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of traces that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Failed outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &TraceOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Process traces in parallel with the named strategy.
///
/// `threads = 0` uses one worker per logical CPU. An unknown strategy name
/// fails the whole batch before any work starts.
pub fn process_batch(
    traces: &[CvTrace],
    strategy: &str,
    config: &PipelineConfig,
    threads: usize,
) -> Result<BatchReport, BatchError> {
    let detector = create_detector(strategy)
        .ok_or_else(|| AnalysisError::UnknownStrategy(strategy.to_string()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("cv-worker-{i}"))
        .build()
        .map_err(|e| BatchError::ThreadPool(e.to_string()))?;

    tracing::info!(
        "Processing {} trace(s) with {} strategy on {} worker(s)",
        traces.len(),
        detector.name(),
        pool.current_num_threads()
    );

    let detector: &dyn PeakDetector = detector.as_ref();
    let mut outcomes: Vec<TraceOutcome> = pool.install(|| {
        traces
            .par_iter()
            .enumerate()
            .map(|(index, trace)| match detect_with(trace, detector, config) {
                Ok(result) => TraceOutcome::success(index, trace, result),
                Err(e) => {
                    tracing::warn!("'{}' failed: {}", trace.metadata.display_name(), e);
                    TraceOutcome::failure(index, trace, e.to_string())
                }
            })
            .collect()
    });

    // Input order
    outcomes.sort_by_key(|o| o.index);

    let report = BatchReport { outcomes };
    tracing::info!(
        "Batch complete: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );

    Ok(report)
}
