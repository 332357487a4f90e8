use crate::bragg::BraggOptions;
use crate::crop::CropPlan;
use crate::drift::{CorrectionMethod, DriftField};
use crate::interp::Interpolation;
use crate::lattice::BraggPeakSet;
use crate::phase::{PhaseMethod, Sigma};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Replayable record of one calibration.
///
/// Holds everything needed to repeat the correction on another dataset
/// acquired on the same grid, without detecting peaks again. Fields are
/// read-only once the calibration has produced the bundle; it serializes to
/// plain nested JSON objects and arrays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriftParameterBundle {
    pub(crate) pre_crop: CropPlan,
    pub(crate) shear: Option<[[f64; 3]; 2]>,
    pub(crate) bragg: BraggOptions,
    pub(crate) method: PhaseMethod,
    pub(crate) correction: CorrectionMethod,
    pub(crate) interpolation: Interpolation,
    pub(crate) sigma: Sigma,
    pub(crate) angle: f64,
    pub(crate) orient: f64,
    pub(crate) raw_peaks: BraggPeakSet,
    pub(crate) ideal_peaks: BraggPeakSet,
    pub(crate) phases: [Array2<f64>; 2],
    pub(crate) field: DriftField,
    pub(crate) post_crop: Option<CropPlan>,
    /// Peaks of the corrected image in the output frame.
    pub(crate) output_peaks: Option<BraggPeakSet>,
}

impl DriftParameterBundle {
    /// Layer shape the bundle accepts.
    pub fn source_shape(&self) -> (usize, usize) {
        self.pre_crop.source_shape
    }

    /// Layer shape the replay produces.
    pub fn output_shape(&self) -> (usize, usize) {
        match &self.post_crop {
            Some(plan) => plan.output_shape(),
            None => self.field.shape(),
        }
    }

    pub fn pre_crop(&self) -> &CropPlan {
        &self.pre_crop
    }

    /// Global shear transform, row-major 2×3.
    pub fn shear(&self) -> Option<[[f64; 3]; 2]> {
        self.shear
    }

    pub fn bragg(&self) -> &BraggOptions {
        &self.bragg
    }

    pub fn method(&self) -> PhaseMethod {
        self.method
    }

    pub fn correction(&self) -> CorrectionMethod {
        self.correction
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn sigma(&self) -> Sigma {
        self.sigma
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn orient(&self) -> f64 {
        self.orient
    }

    pub fn raw_peaks(&self) -> &BraggPeakSet {
        &self.raw_peaks
    }

    pub fn ideal_peaks(&self) -> &BraggPeakSet {
        &self.ideal_peaks
    }

    /// Unwrapped phase maps.
    pub fn phases(&self) -> &[Array2<f64>; 2] {
        &self.phases
    }

    pub fn field(&self) -> &DriftField {
        &self.field
    }

    pub fn post_crop(&self) -> Option<&CropPlan> {
        self.post_crop.as_ref()
    }

    pub fn output_peaks(&self) -> Option<&BraggPeakSet> {
        self.output_peaks.as_ref()
    }
}
