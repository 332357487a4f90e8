use super::timing::TimingBreakdown;
use crate::drift::DriftField;
use crate::lattice::BraggPeakSet;
use ndarray::Array2;
use serde::Serialize;

/// Summary of a calibration, for logs and the demo's JSON output.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub input: InputDescriptor,
    pub timings: TimingBreakdown,
    pub raw_peaks: PeakSummary,
    pub ideal_peaks: PeakSummary,
    pub angle: f64,
    pub orient: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shear: Option<[[f64; 3]; 2]>,
    /// `[min, max]` of each unwrapped phase map.
    pub phase_ranges: [[f64; 2]; 2],
    pub drift: DriftSummary,
    pub output: InputDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<[f64; 2]>,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub rows: usize,
    pub cols: usize,
}

impl From<(usize, usize)> for InputDescriptor {
    fn from((rows, cols): (usize, usize)) -> Self {
        Self { rows, cols }
    }
}

/// Peaks in canonical order with their offsets from the spectrum centre.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakSummary {
    pub peaks: [[f64; 2]; 4],
    pub q_vectors: [[f64; 2]; 4],
    /// Mean spatial frequency of the first pair, in cycles per pixel.
    pub radius: f64,
}

impl From<&BraggPeakSet> for PeakSummary {
    fn from(set: &BraggPeakSet) -> Self {
        Self {
            peaks: *set.peaks(),
            q_vectors: set.q_vectors(),
            radius: set.mean_radius(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSummary {
    pub ux_range: [f64; 2],
    pub uy_range: [f64; 2],
    pub max_magnitude: f64,
    pub rms: f64,
}

impl From<&DriftField> for DriftSummary {
    fn from(field: &DriftField) -> Self {
        let n = field.ux.len().max(1) as f64;
        let sq: f64 = field
            .ux
            .iter()
            .zip(field.uy.iter())
            .map(|(x, y)| x * x + y * y)
            .sum();
        Self {
            ux_range: value_range(&field.ux),
            uy_range: value_range(&field.uy),
            max_magnitude: field.max_magnitude(),
            rms: (sq / n).sqrt(),
        }
    }
}

pub fn value_range(a: &Array2<f64>) -> [f64; 2] {
    a.iter().fold([f64::INFINITY, f64::NEG_INFINITY], |[lo, hi], &v| {
        [lo.min(v), hi.max(v)]
    })
}
