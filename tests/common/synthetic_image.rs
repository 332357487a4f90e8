use ndarray::Array2;
use std::f64::consts::TAU;

/// Square lattice rotated by 45° with `period` pixels along both axes, on a
/// `(rows, cols)` frame. Samples the lattice at `(x + ux, y + uy)`.
pub fn lattice_frame_at<F>(shape: (usize, usize), period: f64, displacement: F) -> Array2<f64>
where
    F: Fn(f64, f64) -> [f64; 2],
{
    let w = TAU / period;
    Array2::from_shape_fn(shape, |(r, c)| {
        let (x, y) = (c as f64, r as f64);
        let u = displacement(x, y);
        let (xs, ys) = (x + u[0], y + u[1]);
        (w * (xs + ys)).cos() + (w * (xs - ys)).cos()
    })
}

/// Square lattice rotated by 45°: two cosines with wave vectors `(±k, -k)`
/// bins in an `n × n` frame.
pub fn diagonal_lattice_at<F>(n: usize, k: f64, displacement: F) -> Array2<f64>
where
    F: Fn(f64, f64) -> [f64; 2],
{
    lattice_frame_at((n, n), n as f64 / k, displacement)
}

/// Undistorted lattice.
pub fn diagonal_lattice(n: usize, k: f64) -> Array2<f64> {
    diagonal_lattice_at(n, k, |_, _| [0.0, 0.0])
}

/// Periodic shear-like drift: `ux` varies along rows, `uy` along columns.
pub fn sinusoidal_drift(n: usize, offset: [f64; 2], amplitude: [f64; 2]) -> impl Fn(f64, f64) -> [f64; 2] {
    let w = TAU / n as f64;
    move |x, y| {
        [
            offset[0] + amplitude[0] * (w * y).sin(),
            offset[1] + amplitude[1] * (w * x).sin(),
        ]
    }
}

/// Drift sampled on the pixel grid, `[ux, uy]`.
pub fn drift_grid<F>(n: usize, displacement: F) -> [Array2<f64>; 2]
where
    F: Fn(f64, f64) -> [f64; 2],
{
    drift_grid_frame((n, n), displacement)
}

pub fn drift_grid_frame<F>(shape: (usize, usize), displacement: F) -> [Array2<f64>; 2]
where
    F: Fn(f64, f64) -> [f64; 2],
{
    let ux = Array2::from_shape_fn(shape, |(r, c)| displacement(c as f64, r as f64)[0]);
    let uy = Array2::from_shape_fn(shape, |(r, c)| displacement(c as f64, r as f64)[1]);
    [ux, uy]
}

/// RMS difference over the interior, ignoring `border` pixels on every edge.
pub fn interior_rms(a: &Array2<f64>, b: &Array2<f64>, border: usize) -> f64 {
    assert_eq!(a.dim(), b.dim(), "shape mismatch");
    let (rows, cols) = a.dim();
    let mut acc = 0.0;
    let mut count = 0usize;
    for r in border..rows - border {
        for c in border..cols - border {
            let d = a[[r, c]] - b[[r, c]];
            acc += d * d;
            count += 1;
        }
    }
    (acc / count as f64).sqrt()
}

pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}
