//! Multiplicative frequency-domain masks applied before peak search.

use super::options::SymmetryMask;
use crate::fourier::gaussian2d;
use crate::lattice::center_of;
use ndarray::Array2;

/// `1 - G`, with `G` a unit Gaussian at the centre of width `ratio * size`.
pub fn low_q_mask(shape: (usize, usize), ratio: f64) -> Array2<f64> {
    let (rows, cols) = shape;
    let sigma = [cols as f64 * ratio, rows as f64 * ratio];
    gaussian2d(shape, center_of(shape), sigma, 0.0, 1.0).mapv(|g| 1.0 - g)
}

/// Zeroes the stripes around the central row and column.
pub fn axis_mask(shape: (usize, usize), ratio: f64) -> Array2<f64> {
    let (rows, cols) = shape;
    let half_r = (rows as f64 * ratio) as usize;
    let half_c = (cols as f64 * ratio) as usize;
    let (cr, cc) = (rows / 2, cols / 2);
    Array2::from_shape_fn(shape, |(r, c)| {
        let in_row_band = r + half_r >= cr && r < cr + half_r;
        let in_col_band = c + half_c >= cc && c < cc + half_c;
        if in_row_band || in_col_band {
            0.0
        } else {
            1.0
        }
    })
}

/// Zeroes `order` bands through the centre, see [`SymmetryMask`].
pub fn symmetry_mask(shape: (usize, usize), mask: &SymmetryMask) -> Array2<f64> {
    let (rows, cols) = shape;
    let c = center_of(shape);
    let aspect = rows as f64 / cols as f64;
    let step = 2.0 * std::f64::consts::PI / mask.order.max(1) as f64;
    let angles: Vec<(f64, f64)> = (0..mask.order)
        .map(|i| {
            let a = mask.offset + step * i as f64;
            (a.cos(), a.sin())
        })
        .collect();
    Array2::from_shape_fn(shape, |(r, col)| {
        let dx = col as f64 - c[0];
        let dy = r as f64 - c[1];
        let hit = angles
            .iter()
            .any(|(cos, sin)| (cos * dy - sin * dx * aspect).abs() < mask.width);
        if hit {
            0.0
        } else {
            1.0
        }
    })
}
