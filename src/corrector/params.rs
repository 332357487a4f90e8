//! Parameters of one drift calibration.
//!
//! Every field has a default, so a JSON config only needs the values it
//! changes. The object is built once per calibration and never mutated by
//! the pipeline.

use crate::bragg::BraggOptions;
use crate::crop::{CropSpec, Margins};
use crate::drift::{ConvolutionSign, CorrectionMethod};
use crate::interp::Interpolation;
use crate::lattice::BraggPeakSet;
use crate::phase::{PhaseMethod, Sigma, UnwrapOptions};
use crate::shear::ShearTarget;
use serde::{Deserialize, Serialize};

/// Calibration parameters.
///
/// - `pre_crop`: margins removed before anything else (bad scan lines,
///   regions with excessive drift).
/// - `shear`: optional global affine correction before the local one.
/// - `angle` / `orient`: ideal inter-peak angle and orientation; inferred
///   from the detected peaks when `None`.
/// - `ideal_peaks`: explicit target peaks; skips the detection of the
///   reference lattice unless a shear correction needs it.
/// - `sigma`: demodulation width, Fourier bins for lock-in and pixels for
///   convolution.
/// - `correction`: overrides the applier paired with `method`.
/// - `post_crop`: crop of the corrected image, usually commensurate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftParams {
    pub pre_crop: Margins,
    pub shear: Option<ShearTarget>,
    pub bragg: BraggOptions,
    pub angle: Option<f64>,
    pub orient: Option<f64>,
    pub ideal_peaks: Option<BraggPeakSet>,
    pub even_out: bool,
    pub sigma: Sigma,
    pub method: PhaseMethod,
    pub correction: Option<CorrectionMethod>,
    pub interpolation: Interpolation,
    pub unwrap: UnwrapOptions,
    pub convolution_sign: ConvolutionSign,
    pub post_crop: Option<CropSpec>,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            pre_crop: Margins::default(),
            shear: None,
            bragg: BraggOptions::default(),
            angle: None,
            orient: None,
            ideal_peaks: None,
            even_out: false,
            sigma: Sigma::default(),
            method: PhaseMethod::LockIn,
            correction: None,
            interpolation: Interpolation::Cubic,
            unwrap: UnwrapOptions::default(),
            convolution_sign: ConvolutionSign::Native,
            post_crop: None,
        }
    }
}

impl DriftParams {
    pub fn correction_method(&self) -> CorrectionMethod {
        self.correction
            .unwrap_or_else(|| CorrectionMethod::default_for(self.method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let p: DriftParams = serde_json::from_str(
            r#"{ "method": "convolution", "sigma": [3.0, 4.0], "pre_crop": [1, 2, 3, 4] }"#,
        )
        .unwrap();
        assert_eq!(p.method, PhaseMethod::Convolution);
        assert_eq!(p.sigma, Sigma::PerAxis([3.0, 4.0]));
        assert_eq!(p.pre_crop.edges(), [1, 2, 3, 4]);
        assert_eq!(p.correction_method(), CorrectionMethod::InverseFourier);
        assert_eq!(p.bragg.min_dist, 5);
        assert!((p.unwrap.tolerance - 0.25).abs() < 1e-12);
    }

    #[test]
    fn explicit_correction_overrides_pairing() {
        let p = DriftParams {
            method: PhaseMethod::Convolution,
            correction: Some(CorrectionMethod::Resample),
            ..DriftParams::default()
        };
        assert_eq!(p.correction_method(), CorrectionMethod::Resample);
    }
}
