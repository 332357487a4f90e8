//! Local lattice phase relative to an ideal cosine lattice.
//!
//! Two demodulators are available:
//! - **Lock-in**: multiply by `sin(Q·r)` and `cos(Q·r)`, keep the low band of
//!   each product with a Fourier-domain Gaussian of width `sigma` bins, and
//!   take `atan2(sin, cos)`. For a lattice displaced as `cos(Q·(r + u))` this
//!   yields `-Q·u`.
//! - **Convolution**: multiply by `exp(-i Q·r)` and convolve with a Gaussian of
//!   width `sigma` pixels; the argument of the result is `+Q·u` and its
//!   modulus is the local amplitude.
//!
//! Direction 1 uses the first canonical peak, direction 2 the second.

pub mod unwrap;

pub use unwrap::{unwrap_line, unwrap_phase, Traversal, UnwrapOptions, UnwrapStrategy};

use crate::error::{DriftError, Result};
use crate::fourier::{fourier_lowpass, gaussian_smooth_complex};
use crate::lattice::BraggPeakSet;
use log::debug;
use ndarray::{Array2, ArrayView2, Zip};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Demodulation method; also selects the matching drift inversion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMethod {
    #[default]
    LockIn,
    Convolution,
}

impl FromStr for PhaseMethod {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lockin" | "lock_in" | "lock-in" => Ok(PhaseMethod::LockIn),
            "convolution" => Ok(PhaseMethod::Convolution),
            other => Err(DriftError::UnsupportedMethod(format!("phase method '{other}'"))),
        }
    }
}

/// Smoothing width, scalar or `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sigma {
    Uniform(f64),
    PerAxis([f64; 2]),
}

impl Default for Sigma {
    fn default() -> Self {
        Sigma::Uniform(10.0)
    }
}

impl Sigma {
    pub fn per_axis(&self) -> Result<[f64; 2]> {
        let s = match *self {
            Sigma::Uniform(v) => [v, v],
            Sigma::PerAxis(v) => v,
        };
        if s.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(DriftError::Configuration(format!(
                "smoothing width must be positive, got {s:?}"
            )));
        }
        Ok(s)
    }
}

/// Phase maps along the two lattice directions.
#[derive(Clone, Debug)]
pub struct PhaseMaps {
    pub theta: [Array2<f64>; 2],
    /// Local amplitude; only produced by the convolution method.
    pub amplitude: Option<[Array2<f64>; 2]>,
    /// Angular frequencies (rad / px) of the two directions.
    pub q: [[f64; 2]; 2],
}

/// Computes the phase maps of `layer` against the ideal lattice `peaks`.
pub fn phase_map(
    layer: ArrayView2<'_, f64>,
    peaks: &BraggPeakSet,
    sigma: Sigma,
    method: PhaseMethod,
) -> Result<PhaseMaps> {
    if peaks.shape() != layer.dim() {
        return Err(DriftError::ShapeMismatch {
            expected: layer.dim(),
            found: peaks.shape(),
        });
    }
    let sigma = sigma.per_axis()?;
    let q = [peaks.spatial_frequency(0), peaks.spatial_frequency(1)];
    debug!("phase map ({method:?}): Q1={:?} Q2={:?} sigma={sigma:?}", q[0], q[1]);
    let maps = match method {
        PhaseMethod::LockIn => {
            let theta = q.map(|qi| lock_in(layer, qi, sigma));
            PhaseMaps {
                theta,
                amplitude: None,
                q,
            }
        }
        PhaseMethod::Convolution => {
            let [(t1, a1), (t2, a2)] = q.map(|qi| demodulate(layer, qi, sigma));
            PhaseMaps {
                theta: [t1, t2],
                amplitude: Some([a1, a2]),
                q,
            }
        }
    };
    Ok(maps)
}

fn grating(shape: (usize, usize), q: [f64; 2]) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(r, c)| q[0] * c as f64 + q[1] * r as f64)
}

fn lock_in(layer: ArrayView2<'_, f64>, q: [f64; 2], sigma: [f64; 2]) -> Array2<f64> {
    let arg = grating(layer.dim(), q);
    let sin_part = Zip::from(&layer).and(&arg).map_collect(|a, t| a * t.sin());
    let cos_part = Zip::from(&layer).and(&arg).map_collect(|a, t| a * t.cos());
    let s = fourier_lowpass(sin_part.view(), sigma);
    let c = fourier_lowpass(cos_part.view(), sigma);
    Zip::from(&s).and(&c).map_collect(|s, c| s.atan2(*c))
}

fn demodulate(layer: ArrayView2<'_, f64>, q: [f64; 2], sigma: [f64; 2]) -> (Array2<f64>, Array2<f64>) {
    let arg = grating(layer.dim(), q);
    let mixed = Zip::from(&layer)
        .and(&arg)
        .map_collect(|a, t| Complex64::from_polar(*a, -t));
    let smooth = gaussian_smooth_complex(&mixed, sigma);
    (smooth.mapv(|z| z.arg()), smooth.mapv(|z| z.norm()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn shifted_lattice(n: usize, k: f64, u: [f64; 2]) -> Array2<f64> {
        let w = 2.0 * PI * k / n as f64;
        Array2::from_shape_fn((n, n), |(r, c)| {
            let (x, y) = (c as f64 + u[0], r as f64 + u[1]);
            0.5 * ((w * (-x - y)).cos() + (w * (x - y)).cos())
        })
    }

    fn peaks(n: usize, k: f64) -> BraggPeakSet {
        let c = (n / 2) as f64;
        BraggPeakSet::new(
            [[c - k, c - k], [c + k, c - k], [c + k, c + k], [c - k, c + k]],
            (n, n),
        )
    }

    #[test]
    fn lock_in_phase_is_minus_q_dot_u() {
        let u = [0.3, -0.2];
        let img = shifted_lattice(64, 8.0, u);
        let maps = phase_map(img.view(), &peaks(64, 8.0), Sigma::Uniform(2.0), PhaseMethod::LockIn)
            .unwrap();
        for d in 0..2 {
            let expected = -(maps.q[d][0] * u[0] + maps.q[d][1] * u[1]);
            for v in maps.theta[d].iter() {
                assert!((v - expected).abs() < 1e-6, "{v} vs {expected}");
            }
        }
    }

    #[test]
    fn convolution_phase_is_plus_q_dot_u() {
        let u = [0.3, -0.2];
        let img = shifted_lattice(64, 8.0, u);
        let maps = phase_map(
            img.view(),
            &peaks(64, 8.0),
            Sigma::Uniform(6.0),
            PhaseMethod::Convolution,
        )
        .unwrap();
        let amp = maps.amplitude.as_ref().unwrap();
        for d in 0..2 {
            let expected = maps.q[d][0] * u[0] + maps.q[d][1] * u[1];
            for (v, a) in maps.theta[d].iter().zip(amp[d].iter()) {
                assert!((v - expected).abs() < 1e-6, "{v} vs {expected}");
                assert!((a - 0.25).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn method_names_parse() {
        assert_eq!("lockin".parse::<PhaseMethod>().unwrap(), PhaseMethod::LockIn);
        assert_eq!(
            "Convolution".parse::<PhaseMethod>().unwrap(),
            PhaseMethod::Convolution
        );
        assert!(matches!(
            "fourier".parse::<PhaseMethod>(),
            Err(DriftError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn non_positive_sigma_is_rejected() {
        let img = shifted_lattice(32, 4.0, [0.0, 0.0]);
        let err = phase_map(img.view(), &peaks(32, 4.0), Sigma::Uniform(0.0), PhaseMethod::LockIn)
            .unwrap_err();
        assert!(matches!(err, DriftError::Configuration(_)));
    }
}
