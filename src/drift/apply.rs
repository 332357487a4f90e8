use super::field::DriftField;
use crate::error::{DriftError, Result};
use crate::fourier::{ifft2, ifftshift};
use crate::image::{Image, LayerProgress};
use crate::interp::{resample, Interpolation};
use crate::phase::PhaseMethod;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array2, ArrayView2};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::str::FromStr;

/// How a drift field is applied to a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    /// Sample the observed layer at `r - u(r)`.
    Resample,
    /// Place every observed sample at `r + u(r)` and rebuild the layer from
    /// the non-uniform Fourier sum.
    InverseFourier,
}

impl CorrectionMethod {
    /// Applier paired with each phase method unless overridden.
    pub fn default_for(method: PhaseMethod) -> Self {
        match method {
            PhaseMethod::LockIn => CorrectionMethod::Resample,
            PhaseMethod::Convolution => CorrectionMethod::InverseFourier,
        }
    }
}

impl FromStr for CorrectionMethod {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resample" | "interpolation" => Ok(CorrectionMethod::Resample),
            "inverse_fourier" | "inverse-fourier" | "fourier" => Ok(CorrectionMethod::InverseFourier),
            other => Err(DriftError::UnsupportedMethod(format!(
                "correction method '{other}'"
            ))),
        }
    }
}

/// Corrects one layer. The field must match the layer shape.
pub fn apply_drift(
    layer: ArrayView2<'_, f64>,
    field: &DriftField,
    method: CorrectionMethod,
    interpolation: Interpolation,
) -> Result<Array2<f64>> {
    if field.shape() != layer.dim() {
        return Err(DriftError::ShapeMismatch {
            expected: layer.dim(),
            found: field.shape(),
        });
    }
    Ok(match method {
        CorrectionMethod::Resample => resample_layer(layer, field, interpolation),
        CorrectionMethod::InverseFourier => inverse_fourier_layer(layer, field),
    })
}

/// Corrects every layer of `image` with the same field.
pub fn apply_drift_image(
    image: &Image,
    field: &DriftField,
    method: CorrectionMethod,
    interpolation: Interpolation,
    progress: &dyn LayerProgress,
) -> Result<Image> {
    if field.shape() != image.layer_shape() {
        return Err(DriftError::ShapeMismatch {
            expected: image.layer_shape(),
            found: field.shape(),
        });
    }
    image.map_layers(progress, |layer| apply_drift(layer, field, method, interpolation))
}

fn resample_layer(
    layer: ArrayView2<'_, f64>,
    field: &DriftField,
    interpolation: Interpolation,
) -> Array2<f64> {
    resample(layer, interpolation, layer.dim(), |r, c| {
        (c as f64 - field.ux[[r, c]], r as f64 - field.uy[[r, c]])
    })
}

/// Non-uniform forward transform onto the centred frequency grid
/// `q = 2π (k - n/2) / n`, followed by a regular inverse FFT.
///
/// Samples displaced outside `[0, n]` on either axis are dropped. The sum is
/// accumulated one image row at a time as a rank-`cols` matrix product.
fn inverse_fourier_layer(layer: ArrayView2<'_, f64>, field: &DriftField) -> Array2<f64> {
    let (rows, cols) = layer.dim();
    let mean = layer.mean().unwrap_or(0.0);
    let qx: Vec<f64> = (0..cols)
        .map(|k| TAU * (k as f64 - (cols / 2) as f64) / cols as f64)
        .collect();
    let qy: Vec<f64> = (0..rows)
        .map(|k| TAU * (k as f64 - (rows / 2) as f64) / rows as f64)
        .collect();

    let mut spectrum = Array2::<Complex64>::zeros((rows, cols));
    let mut weighted_y = Array2::<Complex64>::zeros((cols, rows));
    let mut phase_x = Array2::<Complex64>::zeros((cols, cols));
    let one = Complex64::new(1.0, 0.0);
    for r in 0..rows {
        for c in 0..cols {
            let x = c as f64 + field.ux[[r, c]];
            let y = r as f64 + field.uy[[r, c]];
            let inside = (0.0..=cols as f64).contains(&x) && (0.0..=rows as f64).contains(&y);
            let amp = if inside { layer[[r, c]] - mean } else { 0.0 };
            for (k, q) in qy.iter().enumerate() {
                weighted_y[[c, k]] = Complex64::from_polar(amp, -q * y);
            }
            for (k, q) in qx.iter().enumerate() {
                phase_x[[c, k]] = Complex64::from_polar(1.0, -q * x);
            }
        }
        general_mat_mul(one, &weighted_y.t(), &phase_x, one, &mut spectrum);
    }
    ifft2(&ifftshift(&spectrum)).mapv(|z| z.re + mean)
}
