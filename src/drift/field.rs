use crate::error::{DriftError, Result};
use crate::phase::PhaseMethod;
use log::debug;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Sign applied to the convolution-method displacement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvolutionSign {
    /// Displacement as measured, `u = Σ φ_i Q_i / |Q_i|²`.
    #[default]
    Native,
    Negated,
}

/// Per-pixel displacement in pixels. The observed image satisfies
/// `observed(r) = ideal(r + u(r))`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriftField {
    pub ux: Array2<f64>,
    pub uy: Array2<f64>,
}

impl DriftField {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            ux: Array2::zeros(shape),
            uy: Array2::zeros(shape),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.ux.dim()
    }

    /// Largest displacement magnitude.
    pub fn max_magnitude(&self) -> f64 {
        Zip::from(&self.ux)
            .and(&self.uy)
            .fold(0.0f64, |acc, x, y| acc.max(x.hypot(*y)))
    }
}

/// Converts unwrapped phase maps into a displacement field.
///
/// Lock-in phases satisfy `θ = -M u` with `M` the matrix whose rows are
/// `Q1` and `Q2`, so `u = -M⁻¹ θ`; a singular `M` is a
/// [`DriftError::DegenerateGeometry`]. Convolution phases satisfy
/// `φ_i = Q_i·u` and are projected back onto the unit directions.
pub fn drift_field(
    phases: &[Array2<f64>; 2],
    q: [[f64; 2]; 2],
    method: PhaseMethod,
    sign: ConvolutionSign,
) -> Result<DriftField> {
    if phases[0].dim() != phases[1].dim() {
        return Err(DriftError::ShapeMismatch {
            expected: phases[0].dim(),
            found: phases[1].dim(),
        });
    }
    let [q1, q2] = q;
    let field = match method {
        PhaseMethod::LockIn => {
            let det = q1[0] * q2[1] - q1[1] * q2[0];
            if !det.is_finite() || det.abs() < 1e-12 {
                return Err(DriftError::DegenerateGeometry(format!(
                    "lattice vectors {q1:?} and {q2:?} are collinear"
                )));
            }
            let ux = Zip::from(&phases[0])
                .and(&phases[1])
                .map_collect(|t1, t2| -(q2[1] * t1 - q1[1] * t2) / det);
            let uy = Zip::from(&phases[0])
                .and(&phases[1])
                .map_collect(|t1, t2| -(q1[0] * t2 - q2[0] * t1) / det);
            DriftField { ux, uy }
        }
        PhaseMethod::Convolution => {
            let n1 = q1[0] * q1[0] + q1[1] * q1[1];
            let n2 = q2[0] * q2[0] + q2[1] * q2[1];
            if n1 <= 0.0 || n2 <= 0.0 {
                return Err(DriftError::DegenerateGeometry(
                    "zero-length lattice vector".to_string(),
                ));
            }
            let s = match sign {
                ConvolutionSign::Native => 1.0,
                ConvolutionSign::Negated => -1.0,
            };
            let ux = Zip::from(&phases[0])
                .and(&phases[1])
                .map_collect(|p1, p2| s * (p1 * q1[0] / n1 + p2 * q2[0] / n2));
            let uy = Zip::from(&phases[0])
                .and(&phases[1])
                .map_collect(|p1, p2| s * (p1 * q1[1] / n1 + p2 * q2[1] / n2));
            DriftField { ux, uy }
        }
    };
    debug!(
        "drift field ({method:?}): max |u| = {:.4} px",
        field.max_magnitude()
    );
    Ok(field)
}
