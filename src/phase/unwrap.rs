//! Removal of 2π slips from wrapped phase maps.
//!
//! A jump between neighbours larger than `tolerance · 2π` is taken as a slip
//! and compensated by a whole turn. The sweep strategy unwraps every row,
//! then every column, then aligns rows and columns against the central column
//! and row. The spiral strategy unwraps a single path that winds from the
//! border inwards.

use ndarray::{s, Array2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwrapStrategy {
    #[default]
    Sweep,
    Spiral {
        clockwise: bool,
    },
}

/// Order in which rows and columns are visited by the sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Traversal {
    Forward,
    /// Both axes flipped before unwrapping and restored afterwards.
    #[default]
    Reversed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UnwrapOptions {
    /// Slip threshold as a fraction of a full turn.
    pub tolerance: f64,
    pub strategy: UnwrapStrategy,
    pub traversal: Traversal,
}

impl Default for UnwrapOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.25,
            strategy: UnwrapStrategy::Sweep,
            traversal: Traversal::Reversed,
        }
    }
}

/// Turns to add at each step of a line, from the raw differences.
fn slip_counts<'a>(values: impl Iterator<Item = &'a f64>, tol: f64) -> Vec<f64> {
    let values: Vec<f64> = values.copied().collect();
    let mut acc = 0.0;
    let mut turns = Vec::with_capacity(values.len());
    turns.push(0.0);
    for w in values.windows(2) {
        let d = w[1] - w[0];
        if d < -tol {
            acc += 1.0;
        } else if d > tol {
            acc -= 1.0;
        }
        turns.push(acc);
    }
    turns
}

/// Unwraps a 1D line in place; `tolerance` is in radians.
pub fn unwrap_line(mut line: ArrayViewMut1<'_, f64>, tolerance: f64) {
    let turns = slip_counts(line.iter(), tolerance);
    for (v, t) in line.iter_mut().zip(turns) {
        *v += TAU * t;
    }
}

/// Unwraps a 2D phase map.
pub fn unwrap_phase(map: &Array2<f64>, options: &UnwrapOptions) -> Array2<f64> {
    let tol = options.tolerance * TAU;
    match options.strategy {
        UnwrapStrategy::Sweep => match options.traversal {
            Traversal::Forward => sweep(map.clone(), tol),
            Traversal::Reversed => {
                let flipped = map.slice(s![..;-1, ..;-1]).to_owned();
                sweep(flipped, tol).slice(s![..;-1, ..;-1]).to_owned()
            }
        },
        UnwrapStrategy::Spiral { clockwise } => spiral(map, tol, clockwise),
    }
}

fn sweep(mut out: Array2<f64>, tol: f64) -> Array2<f64> {
    let (rows, cols) = out.dim();
    if rows == 0 || cols == 0 {
        return out;
    }
    for row in out.axis_iter_mut(Axis(0)) {
        unwrap_line(row, tol);
    }
    for col in out.axis_iter_mut(Axis(1)) {
        unwrap_line(col, tol);
    }
    // Align every column against the central one, and every row against the central row.
    let down = slip_counts(out.column(cols / 2).iter(), tol);
    let across = slip_counts(out.row(rows / 2).iter(), tol);
    for ((r, c), v) in out.indexed_iter_mut() {
        *v += TAU * (down[r] + across[c]);
    }
    out
}

/// Pixel visiting order for a clockwise spiral starting at the top-left corner.
fn spiral_order(rows: usize, cols: usize) -> Vec<(usize, usize)> {
    let mut order = Vec::with_capacity(rows * cols);
    if rows == 0 || cols == 0 {
        return order;
    }
    let (mut top, mut bottom, mut left, mut right) = (0usize, rows - 1, 0usize, cols - 1);
    loop {
        order.extend((left..=right).map(|c| (top, c)));
        if top == bottom {
            break;
        }
        top += 1;
        order.extend((top..=bottom).map(|r| (r, right)));
        if left == right {
            break;
        }
        right -= 1;
        order.extend((left..=right).rev().map(|c| (bottom, c)));
        if top == bottom {
            break;
        }
        bottom -= 1;
        order.extend((top..=bottom).rev().map(|r| (r, left)));
        if left == right {
            break;
        }
        left += 1;
    }
    order
}

fn spiral(map: &Array2<f64>, tol: f64, clockwise: bool) -> Array2<f64> {
    let (rows, cols) = map.dim();
    let order: Vec<(usize, usize)> = if clockwise {
        spiral_order(rows, cols)
    } else {
        spiral_order(cols, rows)
            .into_iter()
            .map(|(c, r)| (r, c))
            .collect()
    };
    let turns = slip_counts(order.iter().map(|&idx| &map[idx]), tol);
    let mut out = map.clone();
    for (idx, t) in order.into_iter().zip(turns) {
        out[idx] += TAU * t;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use std::f64::consts::PI;

    fn wrap(v: f64) -> f64 {
        (v + PI).rem_euclid(TAU) - PI
    }

    fn ramp(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| 0.3 * c as f64 - 0.2 * r as f64 + 0.1)
    }

    fn assert_turn_offset(got: &Array2<f64>, truth: &Array2<f64>) {
        let offset = got[[0, 0]] - truth[[0, 0]];
        let turns = offset / TAU;
        assert!((turns - turns.round()).abs() < 1e-9, "offset {offset} is not whole turns");
        for (g, t) in got.iter().zip(truth.iter()) {
            assert!((g - t - offset).abs() < 1e-9);
        }
    }

    #[test]
    fn line_unwrap_restores_ramp() {
        let truth = Array1::from_shape_fn(40, |i| 0.4 * i as f64);
        let mut line = truth.mapv(wrap);
        unwrap_line(line.view_mut(), 0.25 * TAU);
        for (a, b) in line.iter().zip(truth.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn smooth_map_is_unchanged() {
        let map = Array2::from_shape_fn((20, 24), |(r, c)| 0.5 * ((r + c) as f64 * 0.1).sin());
        for strategy in [
            UnwrapStrategy::Sweep,
            UnwrapStrategy::Spiral { clockwise: true },
        ] {
            let opts = UnwrapOptions {
                strategy,
                ..UnwrapOptions::default()
            };
            assert_eq!(unwrap_phase(&map, &opts), map);
        }
    }

    #[test]
    fn unwrapping_twice_matches_once() {
        let wrapped = ramp(30, 30).mapv(wrap);
        let opts = UnwrapOptions::default();
        let once = unwrap_phase(&wrapped, &opts);
        let twice = unwrap_phase(&once, &opts);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn wrapped_ramp_is_recovered_by_every_strategy() {
        let truth = ramp(25, 31);
        let wrapped = truth.mapv(wrap);
        let strategies = [
            (UnwrapStrategy::Sweep, Traversal::Forward),
            (UnwrapStrategy::Sweep, Traversal::Reversed),
            (UnwrapStrategy::Spiral { clockwise: true }, Traversal::Forward),
            (UnwrapStrategy::Spiral { clockwise: false }, Traversal::Forward),
        ];
        for (strategy, traversal) in strategies {
            let opts = UnwrapOptions {
                tolerance: 0.25,
                strategy,
                traversal,
            };
            assert_turn_offset(&unwrap_phase(&wrapped, &opts), &truth);
        }
    }

    #[test]
    fn block_slip_is_removed() {
        let truth = Array2::from_shape_fn((16, 16), |(r, c)| 0.05 * (r + c) as f64);
        let mut slipped = truth.clone();
        slipped.slice_mut(s![4..9, 6..12]).mapv_inplace(|v| v + TAU);
        let out = unwrap_phase(&slipped, &UnwrapOptions::default());
        assert_turn_offset(&out, &truth);
    }

    #[test]
    fn spiral_visits_every_pixel_once() {
        for (rows, cols) in [(1, 5), (4, 1), (3, 3), (4, 6), (7, 2)] {
            let order = spiral_order(rows, cols);
            assert_eq!(order.len(), rows * cols);
            let mut seen = Array2::<u8>::zeros((rows, cols));
            for (i, &(r, c)) in order.iter().enumerate() {
                seen[[r, c]] += 1;
                if i > 0 {
                    let (pr, pc) = order[i - 1];
                    assert_eq!(pr.abs_diff(r) + pc.abs_diff(c), 1);
                }
            }
            assert!(seen.iter().all(|&v| v == 1));
        }
    }
}
