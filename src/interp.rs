//! Sub-pixel sampling of a layer at arbitrary coordinates.
//!
//! - **Cubic**: interpolating cubic B-spline. Coefficients are obtained with the
//!   recursive prefilter (pole `sqrt(3) - 2`) under mirror boundary conditions,
//!   so the spline passes through every sample.
//! - **Linear**: bilinear interpolation of the raw samples.
//!
//! Coordinates are `(x, y)` = (column, row).

use crate::error::DriftError;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Interpolation kernel used by the resampling stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Linear,
    #[default]
    Cubic,
}

impl Interpolation {
    /// Maps a spline order (1 or 3) onto a kernel.
    pub fn from_order(order: usize) -> Result<Self, DriftError> {
        match order {
            1 => Ok(Interpolation::Linear),
            3 => Ok(Interpolation::Cubic),
            other => Err(DriftError::UnsupportedMethod(format!(
                "interpolation order {other}"
            ))),
        }
    }
}

impl FromStr for Interpolation {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Interpolation::Linear),
            "cubic" => Ok(Interpolation::Cubic),
            other => Err(DriftError::UnsupportedMethod(format!(
                "interpolation '{other}'"
            ))),
        }
    }
}

/// Precomputed sampler over one layer.
#[derive(Clone, Debug)]
pub struct Interpolator {
    mode: Interpolation,
    /// Spline coefficients for `Cubic`, raw samples for `Linear`.
    coeffs: Array2<f64>,
}

impl Interpolator {
    pub fn new(layer: ArrayView2<'_, f64>, mode: Interpolation) -> Self {
        let mut coeffs = layer.to_owned();
        if mode == Interpolation::Cubic {
            prefilter_axis(&mut coeffs, Axis(1));
            prefilter_axis(&mut coeffs, Axis(0));
        }
        Self { mode, coeffs }
    }

    pub fn mode(&self) -> Interpolation {
        self.mode
    }

    /// Samples at `(x, y)`, clamping the coordinate onto the layer.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let (rows, cols) = self.coeffs.dim();
        if rows == 0 || cols == 0 {
            return 0.0;
        }
        let x = clamp_coord(x, cols);
        let y = clamp_coord(y, rows);
        match self.mode {
            Interpolation::Linear => self.bilinear(x, y),
            Interpolation::Cubic => self.bspline(x, y),
        }
    }

    /// Samples at `(x, y)`, returning `fill` outside the layer extent.
    pub fn sample_or(&self, x: f64, y: f64, fill: f64) -> f64 {
        let (rows, cols) = self.coeffs.dim();
        let tol = 1e-9;
        if !x.is_finite()
            || !y.is_finite()
            || x < -tol
            || y < -tol
            || x > cols as f64 - 1.0 + tol
            || y > rows as f64 - 1.0 + tol
        {
            return fill;
        }
        self.sample(x, y)
    }

    fn bilinear(&self, x: f64, y: f64) -> f64 {
        let (rows, cols) = self.coeffs.dim();
        let x0 = (x.floor() as usize).min(cols - 1);
        let y0 = (y.floor() as usize).min(rows - 1);
        let x1 = (x0 + 1).min(cols - 1);
        let y1 = (y0 + 1).min(rows - 1);
        let tx = x - x0 as f64;
        let ty = y - y0 as f64;
        let c = &self.coeffs;
        let top = c[[y0, x0]] * (1.0 - tx) + c[[y0, x1]] * tx;
        let bottom = c[[y1, x0]] * (1.0 - tx) + c[[y1, x1]] * tx;
        top * (1.0 - ty) + bottom * ty
    }

    fn bspline(&self, x: f64, y: f64) -> f64 {
        let (rows, cols) = self.coeffs.dim();
        let ix = x.floor() as isize;
        let iy = y.floor() as isize;
        let wx = cubic_weights(x - ix as f64);
        let wy = cubic_weights(y - iy as f64);
        let mut acc = 0.0;
        for (j, wyj) in wy.iter().enumerate() {
            let r = mirror_index(iy - 1 + j as isize, rows);
            let mut row_acc = 0.0;
            for (i, wxi) in wx.iter().enumerate() {
                let c = mirror_index(ix - 1 + i as isize, cols);
                row_acc += wxi * self.coeffs[[r, c]];
            }
            acc += wyj * row_acc;
        }
        acc
    }
}

/// Resamples a layer onto a new grid; `coord(row, col)` returns the source `(x, y)`.
pub fn resample<F>(
    layer: ArrayView2<'_, f64>,
    mode: Interpolation,
    shape: (usize, usize),
    coord: F,
) -> Array2<f64>
where
    F: Fn(usize, usize) -> (f64, f64),
{
    let interp = Interpolator::new(layer, mode);
    Array2::from_shape_fn(shape, |(r, c)| {
        let (x, y) = coord(r, c);
        interp.sample(x, y)
    })
}

#[inline]
fn clamp_coord(v: f64, n: usize) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, (n - 1) as f64)
    }
}

#[inline]
fn mirror_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * n as isize - 2;
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

#[inline]
fn cubic_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    let u = 1.0 - t;
    [
        u * u * u / 6.0,
        (4.0 - 6.0 * t2 + 3.0 * t3) / 6.0,
        (1.0 + 3.0 * t + 3.0 * t2 - 3.0 * t3) / 6.0,
        t3 / 6.0,
    ]
}

fn prefilter_axis(data: &mut Array2<f64>, axis: Axis) {
    let n = data.len_of(axis);
    if n < 2 {
        return;
    }
    let mut line = vec![0.0; n];
    for mut lane in data.lanes_mut(axis) {
        for (dst, src) in line.iter_mut().zip(lane.iter()) {
            *dst = *src;
        }
        prefilter_line(&mut line);
        for (dst, src) in lane.iter_mut().zip(line.iter()) {
            *dst = *src;
        }
    }
}

fn prefilter_line(c: &mut [f64]) {
    let n = c.len();
    let z = 3f64.sqrt() - 2.0;
    let lambda = (1.0 - z) * (1.0 - 1.0 / z);
    for v in c.iter_mut() {
        *v *= lambda;
    }
    c[0] = initial_causal(c, z);
    for k in 1..n {
        c[k] += z * c[k - 1];
    }
    c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
    for k in (0..n - 1).rev() {
        c[k] = z * (c[k + 1] - c[k]);
    }
}

fn initial_causal(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    let horizon = (1e-12f64.ln() / z.abs().ln()).ceil() as usize;
    if horizon < n {
        let mut zn = z;
        let mut sum = c[0];
        for v in c.iter().take(horizon).skip(1) {
            sum += zn * v;
            zn *= z;
        }
        return sum;
    }
    let iz = 1.0 / z;
    let mut zn = z;
    let mut z2n = z.powi(n as i32 - 1);
    let mut sum = c[0] + z2n * c[n - 1];
    z2n *= z2n * iz;
    for v in c.iter().take(n - 1).skip(1) {
        sum += (zn + z2n) * v;
        zn *= z;
        z2n *= iz;
    }
    sum / (1.0 - zn * zn)
}
