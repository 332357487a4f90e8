//! The four-peak lattice description and its geometry.
//!
//! Peaks are stored as `[x, y]` pixel coordinates in the centred spectrum of a
//! frame of shape `(rows, cols)`. The centre (DC bin) is `[cols / 2, rows / 2]`.
//!
//! Canonical order is ascending polar angle of the offset from the centre,
//! with `y` growing with the row index. For a 45° square lattice this is
//! lower-left, lower-right, upper-right, upper-left when the frame is drawn
//! with row 0 at the bottom. Every consumer indexes peaks positionally.

use crate::angle::{ccw_angle, compute_dist, polar_angle};
use crate::error::{DriftError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of peaks describing a 2D lattice (two ± pairs).
pub const PEAK_COUNT: usize = 4;

/// Centre `[x, y]` of the shifted spectrum of a `(rows, cols)` frame.
#[inline]
pub fn center_of(shape: (usize, usize)) -> [f64; 2] {
    [(shape.1 / 2) as f64, (shape.0 / 2) as f64]
}

/// Cycles per pixel covered by one spectrum bin along `[x, y]`.
///
/// Bins only describe physical directions once divided by the frame size, so
/// every angle and radius below is taken on the scaled offsets.
#[inline]
pub fn frequency_scale(shape: (usize, usize)) -> [f64; 2] {
    [1.0 / shape.1 as f64, 1.0 / shape.0 as f64]
}

/// Sorts points by polar angle around `center` (canonical order).
pub fn sort_by_polar_angle(points: &mut [[f64; 2]], center: [f64; 2]) {
    points.sort_by(|a, b| {
        let ta = polar_angle(a[0] - center[0], a[1] - center[1]);
        let tb = polar_angle(b[0] - center[0], b[1] - center[1]);
        ta.total_cmp(&tb)
    });
}

/// Rounds every offset from the centre to the nearest even integer.
///
/// Halfway cases round away from zero, so an odd integer offset moves one
/// pixel further from the centre.
pub fn even_out(points: &mut [[f64; 2]], center: [f64; 2]) {
    for p in points.iter_mut() {
        for (v, c) in p.iter_mut().zip(center) {
            let offset = *v - c;
            *v = c + 2.0 * (offset / 2.0).round();
        }
    }
}

/// Four lattice peaks of one frame, always in canonical order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BraggPeakSet {
    peaks: [[f64; 2]; PEAK_COUNT],
    shape: (usize, usize),
}

impl BraggPeakSet {
    /// Builds a set from exactly four peaks, sorting them.
    pub fn new(mut peaks: [[f64; 2]; PEAK_COUNT], shape: (usize, usize)) -> Self {
        sort_by_polar_angle(&mut peaks, center_of(shape));
        Self { peaks, shape }
    }

    /// Keeps the four detections closest to the centre.
    pub fn from_detections(points: &[[f64; 2]], shape: (usize, usize)) -> Result<Self> {
        if points.len() < PEAK_COUNT {
            return Err(DriftError::InsufficientPeaks {
                found: points.len(),
                required: PEAK_COUNT,
            });
        }
        let center = center_of(shape);
        let scale = Some(frequency_scale(shape));
        let mut ranked: Vec<[f64; 2]> = points.to_vec();
        ranked.sort_by(|a, b| {
            compute_dist(*a, center, scale).total_cmp(&compute_dist(*b, center, scale))
        });
        let peaks = [ranked[0], ranked[1], ranked[2], ranked[3]];
        Ok(Self::new(peaks, shape))
    }

    pub fn peaks(&self) -> &[[f64; 2]; PEAK_COUNT] {
        &self.peaks
    }

    /// Shape `(rows, cols)` of the frame the peaks were measured in.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn center(&self) -> [f64; 2] {
        center_of(self.shape)
    }

    /// Peak offsets from the centre, in frequency bins.
    pub fn q_vectors(&self) -> [[f64; 2]; PEAK_COUNT] {
        let c = self.center();
        self.peaks.map(|p| [p[0] - c[0], p[1] - c[1]])
    }

    /// Angular spatial frequency `2π (peak - centre) / size` of peak `index`,
    /// in radians per pixel.
    pub fn spatial_frequency(&self, index: usize) -> [f64; 2] {
        let q = self.q_vectors()[index];
        let (rows, cols) = self.shape;
        [2.0 * PI * q[0] / cols as f64, 2.0 * PI * q[1] / rows as f64]
    }

    /// Peak offsets from the centre in cycles per pixel.
    pub fn normalized_q_vectors(&self) -> [[f64; 2]; PEAK_COUNT] {
        let [sx, sy] = frequency_scale(self.shape);
        self.q_vectors().map(|q| [q[0] * sx, q[1] * sy])
    }

    /// Converts an offset in cycles per pixel back to spectrum coordinates.
    pub fn bins_from_normalized(&self, f: [f64; 2]) -> [f64; 2] {
        let (rows, cols) = self.shape;
        let c = self.center();
        [c[0] + f[0] * cols as f64, c[1] + f[1] * rows as f64]
    }

    /// Mean spatial frequency of the first two peaks, in cycles per pixel.
    pub fn mean_radius(&self) -> f64 {
        let scale = Some(frequency_scale(self.shape));
        let c = self.center();
        0.5 * (compute_dist(self.peaks[0], c, scale) + compute_dist(self.peaks[1], c, scale))
    }

    /// Counter-clockwise angle from the first to the second peak.
    pub fn inter_peak_angle(&self) -> f64 {
        let f = self.normalized_q_vectors();
        ccw_angle(f[0], f[1])
    }

    /// Polar angle of the first peak.
    pub fn orientation(&self) -> f64 {
        let f = self.normalized_q_vectors()[0];
        polar_angle(f[0], f[1])
    }

    /// Copy with every offset rounded to an even number of bins.
    pub fn evened_out(&self) -> Self {
        let mut peaks = self.peaks;
        even_out(&mut peaks, self.center());
        Self::new(peaks, self.shape)
    }

    /// Idealised symmetric set at the mean radius of this one.
    ///
    /// The first pair points along `orient` (default: this set's orientation)
    /// and the second pair is rotated by `angle` counter-clockwise from it.
    /// The geometry is built in cycles per pixel and the offsets are then
    /// rounded to whole bins of this frame.
    pub fn generate_ideal(&self, angle: f64, orient: Option<f64>, even: bool) -> Self {
        let c = self.center();
        let radius = self.mean_radius();
        let orient = orient.unwrap_or_else(|| self.orientation());
        let at = |theta: f64| -> [f64; 2] {
            let p = self.bins_from_normalized([radius * theta.cos(), radius * theta.sin()]);
            [(p[0] - c[0]).round(), (p[1] - c[1]).round()]
        };
        let qc1 = at(orient + PI);
        let qc2 = at(orient + PI + angle);
        let mut peaks = [
            [c[0] + qc1[0], c[1] + qc1[1]],
            [c[0] + qc2[0], c[1] + qc2[1]],
            [c[0] - qc1[0], c[1] - qc1[1]],
            [c[0] - qc2[0], c[1] - qc2[1]],
        ];
        if even {
            even_out(&mut peaks, c);
        }
        let ideal = Self::new(peaks, self.shape);
        debug!(
            "ideal peaks: radius={radius:.5} orient={orient:.4} angle={angle:.4} q={:?}",
            ideal.q_vectors()
        );
        ideal
    }

    /// Same peaks re-expressed for a frame of another shape.
    ///
    /// Frequency offsets scale with the frame size, so a peak keeps its
    /// physical period across crops and resampling.
    pub fn rescaled_to(&self, shape: (usize, usize)) -> Self {
        let q = self.q_vectors();
        let sx = shape.1 as f64 / self.shape.1 as f64;
        let sy = shape.0 as f64 / self.shape.0 as f64;
        let c = center_of(shape);
        let peaks = q.map(|v| [c[0] + v[0] * sx, c[1] + v[1] * sy]);
        Self::new(peaks, shape)
    }
}
