//! Displacement fields and their application.
//!
//! - [`drift_field`] inverts unwrapped phase maps into `(ux, uy)`.
//! - [`apply_drift`] corrects one layer, [`apply_drift_image`] every layer of
//!   a scan or stack.

mod apply;
mod field;

pub use apply::{apply_drift, apply_drift_image, CorrectionMethod};
pub use field::{drift_field, ConvolutionSign, DriftField};
