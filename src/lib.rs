#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod corrector;
pub mod diagnostics;
pub mod error;
pub mod image;

// Stage modules – public so tools can run a single stage, but their
// signatures may still move.
pub mod angle;
pub mod bragg;
pub mod crop;
pub mod drift;
pub mod fourier;
pub mod interp;
pub mod lattice;
pub mod phase;
pub mod shear;

// --- High-level re-exports -------------------------------------------------

// Main entry points: calibration, replay and the session.
pub use crate::corrector::{
    apply_drift_parameters, find_drift_parameters, Calibration, DriftCorrector,
    DriftParameterBundle, DriftParams,
};
pub use crate::error::{DriftError, Result};
pub use crate::image::{Image, LayerProgress, NoProgress, ProgressCounter};

// Report returned next to every calibration.
pub use crate::diagnostics::CalibrationReport;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use lattice_drift::prelude::*;
/// use ndarray::Array2;
///
/// # fn main() -> Result<(), DriftError> {
/// let topo = Array2::<f64>::zeros((256, 256));
/// let params = DriftParams {
///     method: PhaseMethod::LockIn,
///     sigma: Sigma::Uniform(6.0),
///     ..Default::default()
/// };
/// let mut session = DriftCorrector::new(params);
/// let calibration = session.calibrate(topo.view())?;
/// println!("max drift {:.3} px", calibration.report.drift.max_magnitude);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::drift::CorrectionMethod;
    pub use crate::image::{Image, NoProgress};
    pub use crate::phase::{PhaseMethod, Sigma};
    pub use crate::{DriftCorrector, DriftError, DriftParameterBundle, DriftParams};
}

// --- Stage-level API (for tools & advanced users) --------------------------

pub mod stages {
    // Stage runners.
    pub use crate::bragg::{detect_peaks, find_bragg_peaks, masked_spectrum};
    pub use crate::crop::{apply_crop, crop, plan_crop, rough_cut};
    pub use crate::drift::{apply_drift, apply_drift_image, drift_field};
    pub use crate::phase::{phase_map, unwrap_phase};
    pub use crate::shear::{apply_shear, apply_shear_image, shear_matrix, GlobalShearCorrector};

    // Stage value types.
    pub use crate::bragg::BraggOptions;
    pub use crate::crop::{CropPlan, CropSpec, Margins};
    pub use crate::diagnostics::{StageTiming, TimingBreakdown};
    pub use crate::drift::{ConvolutionSign, DriftField};
    pub use crate::lattice::{BraggPeakSet, LatticeParameters};
    pub use crate::phase::{PhaseMaps, UnwrapOptions};
}
