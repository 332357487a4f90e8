//! Error type shared by every stage of the drift-correction pipeline.

use thiserror::Error;

/// Failures raised by detection, geometry and correction stages.
///
/// Boundary pixels dropped by the inverse-Fourier applier and the rounding
/// performed by even-out never surface here.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Missing or invalid lattice size, pixel count or option value.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Fewer lattice peaks than the stage needs passed the thresholds.
    #[error("found {found} Bragg peaks, {required} are required")]
    InsufficientPeaks { found: usize, required: usize },
    /// Unknown phase method, correction method or interpolation order.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),
    /// A field or stored bundle does not match the layer shape (rows, cols).
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Singular or near-singular peak geometry.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    /// A layer loop stopped because its progress sink requested it.
    #[error("cancelled after {completed} of {total} layers")]
    Cancelled { completed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, DriftError>;
