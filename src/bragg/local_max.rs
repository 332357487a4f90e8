//! Local-maximum search with a minimum peak separation.

use ndarray::{Array2, ArrayView2, Axis};

/// Integer maximum at `(row, col)` with its value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalMax {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

fn max_filter_axis(data: ArrayView2<'_, f64>, axis: Axis, radius: usize) -> Array2<f64> {
    let mut out = data.to_owned();
    let n = data.len_of(axis);
    for (src, mut dst) in data.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        for i in 0..n {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(n);
            let mut m = f64::NEG_INFINITY;
            for j in lo..hi {
                m = m.max(src[j]);
            }
            dst[i] = m;
        }
    }
    out
}

/// Maxima of a `(2 d + 1)²` neighbourhood that exceed `threshold_rel * max`.
///
/// A border of width `d` is ignored. Candidates are visited by decreasing
/// value and a candidate within Chebyshev distance `d` of an accepted one is
/// dropped. The result is ordered by decreasing value.
pub fn peak_local_max(data: ArrayView2<'_, f64>, min_dist: usize, threshold_rel: f64) -> Vec<LocalMax> {
    let (rows, cols) = data.dim();
    let d = min_dist.max(1);
    if rows <= 2 * d || cols <= 2 * d {
        return Vec::new();
    }
    let global_max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !global_max.is_finite() {
        return Vec::new();
    }
    let threshold = threshold_rel * global_max;
    let dilated = max_filter_axis(max_filter_axis(data, Axis(1), d).view(), Axis(0), d);

    let mut candidates = Vec::new();
    for r in d..rows - d {
        for c in d..cols - d {
            let v = data[[r, c]];
            if v > threshold && v >= dilated[[r, c]] {
                candidates.push(LocalMax {
                    row: r,
                    col: c,
                    value: v,
                });
            }
        }
    }
    candidates.sort_by(|a, b| b.value.total_cmp(&a.value));

    let mut accepted: Vec<LocalMax> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let crowded = accepted
            .iter()
            .any(|p| p.row.abs_diff(cand.row) <= d && p.col.abs_diff(cand.col) <= d);
        if !crowded {
            accepted.push(cand);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_isolated_maxima_in_order() {
        let mut a = Array2::<f64>::zeros((30, 30));
        a[[10, 10]] = 5.0;
        a[[20, 22]] = 3.0;
        a[[20, 8]] = 0.5;
        let peaks = peak_local_max(a.view(), 3, 0.25);
        assert_eq!(peaks.len(), 2);
        assert_eq!((peaks[0].row, peaks[0].col), (10, 10));
        assert_eq!((peaks[1].row, peaks[1].col), (20, 22));
    }

    #[test]
    fn close_maxima_keep_the_strongest() {
        let mut a = Array2::<f64>::zeros((30, 30));
        a[[15, 15]] = 2.0;
        a[[15, 18]] = 1.9;
        let peaks = peak_local_max(a.view(), 5, 0.1);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].col, 15);
    }

    #[test]
    fn border_is_excluded() {
        let mut a = Array2::<f64>::zeros((20, 20));
        a[[1, 10]] = 4.0;
        a[[10, 10]] = 1.0;
        let peaks = peak_local_max(a.view(), 3, 0.1);
        assert_eq!(peaks.len(), 1);
        assert_eq!((peaks[0].row, peaks[0].col), (10, 10));
    }
}
