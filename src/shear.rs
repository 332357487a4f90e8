//! Global (affine) shear correction driven by the Bragg peak geometry.
//!
//! The transform is estimated in spectrum pixel coordinates: it maps the
//! centre and the first two canonical peaks onto an idealised symmetric
//! configuration. A real-space layer is corrected with the inverse-transpose
//! of the linear part, applied about the frame centre; a spectrum is warped
//! directly with the full affine map.

use crate::bragg::SpectrumInput;
use crate::error::{DriftError, Result};
use crate::image::{Image, LayerProgress};
use crate::interp::{Interpolation, Interpolator};
use crate::lattice::{sort_by_polar_angle, BraggPeakSet};
use log::debug;
use nalgebra::{Matrix2, Matrix2x3, Matrix3, Vector2};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Target geometry of the ideal peak configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShearOptions {
    /// Angle between the first two ideal peaks.
    pub angle: f64,
    /// Polar angle of the first ideal peak (any member of the ± pair).
    pub orient: f64,
}

impl Default for ShearOptions {
    fn default() -> Self {
        Self {
            angle: PI / 2.0,
            orient: PI / 4.0,
        }
    }
}

/// How the shear transform is obtained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShearTarget {
    /// Symmetrise the detected peaks.
    Ideal(ShearOptions),
    /// Explicit 3-point correspondence `[centre, peak, peak]` → targets.
    Points {
        from: [[f64; 2]; 3],
        to: [[f64; 2]; 3],
    },
    /// Precomputed 2×3 transform, row-major.
    Matrix([[f64; 3]; 2]),
}

impl Default for ShearTarget {
    fn default() -> Self {
        ShearTarget::Ideal(ShearOptions::default())
    }
}

/// Transform and corrected layer.
#[derive(Clone, Debug)]
pub struct ShearCorrection {
    pub matrix: Matrix2x3<f64>,
    pub image: Array2<f64>,
}

/// Exact affine map taking the three `from` points onto `to`.
pub fn affine_from_points(from: &[[f64; 2]; 3], to: &[[f64; 2]; 3]) -> Result<Matrix2x3<f64>> {
    let src = Matrix3::new(
        from[0][0], from[1][0], from[2][0], //
        from[0][1], from[1][1], from[2][1], //
        1.0, 1.0, 1.0,
    );
    let inv = src.try_inverse().ok_or_else(|| {
        DriftError::DegenerateGeometry(format!("collinear shear reference points {from:?}"))
    })?;
    let dst = nalgebra::Matrix2x3::new(
        to[0][0], to[1][0], to[2][0], //
        to[0][1], to[1][1], to[2][1],
    );
    Ok(dst * inv)
}

/// Transform symmetrising `peaks` towards the configuration of `options`.
///
/// Angles in `options` are physical: the target is laid out in cycles per
/// pixel and expressed in the bins of the peaks' frame.
pub fn ideal_shear_matrix(peaks: &BraggPeakSet, options: &ShearOptions) -> Result<Matrix2x3<f64>> {
    let c = peaks.center();
    let r = peaks.mean_radius();
    let at = |theta: f64| peaks.bins_from_normalized([r * theta.cos(), r * theta.sin()]);
    let q1 = at(options.orient + PI);
    let q2 = at(options.orient + PI + options.angle);
    let mirror = |p: [f64; 2]| [2.0 * c[0] - p[0], 2.0 * c[1] - p[1]];
    let mut ideal = [q1, q2, mirror(q1), mirror(q2)];
    sort_by_polar_angle(&mut ideal, c);
    let p = peaks.peaks();
    affine_from_points(&[c, p[0], p[1]], &[c, ideal[0], ideal[1]])
}

/// Resolves a [`ShearTarget`] into a transform.
pub fn shear_matrix(peaks: &BraggPeakSet, target: &ShearTarget) -> Result<Matrix2x3<f64>> {
    match target {
        ShearTarget::Ideal(options) => ideal_shear_matrix(peaks, options),
        ShearTarget::Points { from, to } => affine_from_points(from, to),
        ShearTarget::Matrix(m) => Ok(Matrix2x3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2],
        )),
    }
}

/// Row-major copy of a transform, the form stored in parameter bundles.
pub fn matrix_rows(m: &Matrix2x3<f64>) -> [[f64; 3]; 2] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
    ]
}

/// Applies a spectrum-space transform to one layer.
pub fn apply_shear(
    layer: ArrayView2<'_, f64>,
    matrix: &Matrix2x3<f64>,
    domain: SpectrumInput,
) -> Result<Array2<f64>> {
    let (rows, cols) = layer.dim();
    let linear: Matrix2<f64> = matrix.fixed_view::<2, 2>(0, 0).into_owned();
    match domain {
        SpectrumInput::RealSpace => {
            // A peak offset q maps to L q; in real space this is r -> L_f^-T r
            // with L_f the same map on frequencies (cycles per pixel).
            let s = Matrix2::new(1.0 / cols as f64, 0.0, 0.0, 1.0 / rows as f64);
            let s_inv = Matrix2::new(cols as f64, 0.0, 0.0, rows as f64);
            let lf_t = (s * linear * s_inv).transpose();
            let offset = layer.iter().copied().fold(f64::INFINITY, f64::min);
            let shifted = layer.mapv(|v| v - offset);
            let interp = Interpolator::new(shifted.view(), Interpolation::Cubic);
            let c = Vector2::new((cols / 2) as f64, (rows / 2) as f64);
            Ok(Array2::from_shape_fn((rows, cols), |(r, col)| {
                let src = c + lf_t * (Vector2::new(col as f64, r as f64) - c);
                interp.sample_or(src.x, src.y, 0.0) + offset
            }))
        }
        SpectrumInput::Fourier => {
            let inv = linear.try_inverse().ok_or_else(|| {
                DriftError::DegenerateGeometry("singular shear transform".to_string())
            })?;
            let t = Vector2::new(matrix[(0, 2)], matrix[(1, 2)]);
            let interp = Interpolator::new(layer, Interpolation::Cubic);
            Ok(Array2::from_shape_fn((rows, cols), |(r, col)| {
                let src = inv * (Vector2::new(col as f64, r as f64) - t);
                interp.sample_or(src.x, src.y, 0.0)
            }))
        }
    }
}

/// Applies a transform to every layer of an image.
pub fn apply_shear_image(
    image: &Image,
    matrix: &Matrix2x3<f64>,
    domain: SpectrumInput,
    progress: &dyn LayerProgress,
) -> Result<Image> {
    image.map_layers(progress, |layer| apply_shear(layer, matrix, domain))
}

/// Estimates and applies the global shear correction.
#[derive(Clone, Debug, Default)]
pub struct GlobalShearCorrector {
    target: ShearTarget,
    domain: SpectrumInput,
}

impl GlobalShearCorrector {
    pub fn new(target: ShearTarget) -> Self {
        Self {
            target,
            domain: SpectrumInput::RealSpace,
        }
    }

    pub fn with_domain(mut self, domain: SpectrumInput) -> Self {
        self.domain = domain;
        self
    }

    pub fn correct(&self, layer: ArrayView2<'_, f64>, peaks: &BraggPeakSet) -> Result<ShearCorrection> {
        let matrix = shear_matrix(peaks, &self.target)?;
        debug!("global shear matrix: {:?}", matrix_rows(&matrix));
        let image = apply_shear(layer, &matrix, self.domain)?;
        Ok(ShearCorrection { matrix, image })
    }
}
