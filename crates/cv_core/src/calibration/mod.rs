//! Cross-instrument calibration.
//!
//! Maps readings of a target instrument onto a reference instrument with a
//! linear fit on paired traces of the same sample. Independent of peak
//! detection; detected peaks are only used by the optional pairing check.
//!
//! # Usage
//!
//! ```ignore
//! use cv_core::calibration::{CalibrationRegistry, Calibrator};
//!
//! let registry = CalibrationRegistry::load(&path)?;
//! let calibrator = Calibrator::default();
//! let model = calibrator.fit_and_store(&registry, &reference, &target, "dopamine")?;
//! let corrected = calibrator.apply(&model, &new_target_trace);
//! registry.save(&path)?;
//! ```

mod fit;
mod pairing;
mod registry;
mod types;

pub use fit::{align, apply, AlignedPair, Calibrator};
pub use pairing::{check_peak_pairing, PeakPairing};
pub use registry::CalibrationRegistry;
pub use types::{
    CalibrationError, CalibrationKey, CalibrationModel, CalibrationOptions, CalibrationResult,
    SampleConditions,
};
