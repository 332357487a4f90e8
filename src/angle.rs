//! Angle and distance helpers shared by the peak geometry code.
//!
//! Angles follow the array convention used everywhere in the crate: `x` is the
//! column offset, `y` is the row offset and grows with the row index.

use std::f64::consts::PI;

/// Inter-peak angles that occur in real lattices, in radians.
pub const LATTICE_ANGLES: [f64; 7] = [
    PI / 6.0,
    PI / 4.0,
    PI / 3.0,
    PI / 2.0,
    2.0 * PI / 3.0,
    3.0 * PI / 4.0,
    5.0 * PI / 6.0,
];

/// Standard polar angle of the offset `(dx, dy)` in (-π, π].
#[inline]
pub fn polar_angle(dx: f64, dy: f64) -> f64 {
    dy.atan2(dx)
}

/// Euclidean distance with optional per-axis scale factors `[sx, sy]`.
///
/// The scale is used for non-square pixels, where one pixel step along `x`
/// and `y` covers a different physical length.
#[inline]
pub fn compute_dist(a: [f64; 2], b: [f64; 2], scale: Option<[f64; 2]>) -> f64 {
    let [sx, sy] = scale.unwrap_or([1.0, 1.0]);
    let dx = (a[0] - b[0]) * sx;
    let dy = (a[1] - b[1]) * sy;
    (dx * dx + dy * dy).sqrt()
}

/// Wraps an angle into (-π, π].
#[inline]
pub fn wrap_pi(angle: f64) -> f64 {
    let mut a = angle.rem_euclid(2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Counter-clockwise angle from direction `a` to direction `b`, in [0, 2π).
#[inline]
pub fn ccw_angle(a: [f64; 2], b: [f64; 2]) -> f64 {
    (polar_angle(b[0], b[1]) - polar_angle(a[0], a[1])).rem_euclid(2.0 * PI)
}

/// Snaps a measured inter-peak angle onto the closest entry of [`LATTICE_ANGLES`].
pub fn snap_lattice_angle(angle: f64) -> f64 {
    let a = angle.abs();
    LATTICE_ANGLES
        .iter()
        .copied()
        .min_by(|x, y| (x - a).abs().total_cmp(&(y - a).abs()))
        .unwrap_or(PI / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn polar_angle_quadrants() {
        assert!(approx_eq(polar_angle(1.0, 0.0), 0.0));
        assert!(approx_eq(polar_angle(0.0, 1.0), PI / 2.0));
        assert!(approx_eq(polar_angle(-1.0, -1.0), -3.0 * PI / 4.0));
        assert!(approx_eq(polar_angle(-1.0, 0.0), PI));
    }

    #[test]
    fn compute_dist_applies_axis_scale() {
        assert!(approx_eq(compute_dist([0.0, 0.0], [3.0, 4.0], None), 5.0));
        let d = compute_dist([0.0, 0.0], [3.0, 4.0], Some([2.0, 0.5]));
        assert!(approx_eq(d, (36.0f64 + 4.0).sqrt()));
    }

    #[test]
    fn wrap_pi_keeps_range() {
        assert!(approx_eq(wrap_pi(3.0 * PI), PI));
        assert!(approx_eq(wrap_pi(-PI / 2.0), -PI / 2.0));
        assert!(approx_eq(wrap_pi(2.5 * PI), 0.5 * PI));
    }

    #[test]
    fn ccw_angle_is_directional() {
        assert!(approx_eq(ccw_angle([1.0, 0.0], [0.0, 1.0]), PI / 2.0));
        assert!(approx_eq(ccw_angle([0.0, 1.0], [1.0, 0.0]), 3.0 * PI / 2.0));
    }

    #[test]
    fn snapping_picks_common_lattice_angles() {
        assert!(approx_eq(snap_lattice_angle(1.52), PI / 2.0));
        assert!(approx_eq(snap_lattice_angle(1.02), PI / 3.0));
        assert!(approx_eq(snap_lattice_angle(-0.8), PI / 4.0));
        assert!(approx_eq(snap_lattice_angle(2.1), 2.0 * PI / 3.0));
    }
}
