//! Reports produced alongside a calibration.
//!
//! The [`CalibrationReport`] gathers per-stage timings, the raw and ideal
//! peaks, the inferred lattice angle and orientation, phase-map ranges and
//! drift-field extrema. It is instrumentation only: nothing in the pipeline
//! reads it back.

pub mod report;
pub mod timing;

pub use report::{CalibrationReport, DriftSummary, InputDescriptor, PeakSummary};
pub use timing::{StageTiming, TimingBreakdown};
