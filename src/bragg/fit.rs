//! Sub-pixel peak refinement by fitting an axis-aligned 2D Gaussian.

use super::lm::{optimize, LmConfig, LmModel, Sample};
use super::options::SubpixelFit;
use log::debug;
use ndarray::ArrayView2;

/// `offset + amplitude * exp(-(dx² / 2sx² + dy² / 2sy²))`,
/// parameters `[amplitude, x0, y0, sx, sy, offset]`.
struct Gaussian2d {
    extent: [f64; 2],
}

impl LmModel for Gaussian2d {
    fn evaluate(&self, x: f64, y: f64, p: &[f64; 6]) -> f64 {
        let dx = x - p[1];
        let dy = y - p[2];
        p[5] + p[0] * (-(dx * dx) / (2.0 * p[3] * p[3]) - (dy * dy) / (2.0 * p[4] * p[4])).exp()
    }

    fn jacobian_row(&self, x: f64, y: f64, p: &[f64; 6]) -> [f64; 6] {
        let [amp, x0, y0, sx, sy, _] = *p;
        let dx = x - x0;
        let dy = y - y0;
        let e = (-(dx * dx) / (2.0 * sx * sx) - (dy * dy) / (2.0 * sy * sy)).exp();
        let ae = amp * e;
        [
            e,
            ae * dx / (sx * sx),
            ae * dy / (sy * sy),
            ae * dx * dx / (sx * sx * sx),
            ae * dy * dy / (sy * sy * sy),
            1.0,
        ]
    }

    fn constrain(&self, p: &mut [f64; 6]) {
        p[1] = p[1].clamp(0.0, self.extent[0]);
        p[2] = p[2].clamp(0.0, self.extent[1]);
        p[3] = p[3].abs().max(0.1);
        p[4] = p[4].abs().max(0.1);
    }
}

/// Refines an integer peak `(x, y)` on `spectrum`.
///
/// The window is normalised to unit sum before fitting. Returns the original
/// coordinate when the fit does not stay inside the window.
pub fn refine_peak(spectrum: ArrayView2<'_, f64>, peak: [f64; 2], fit: &SubpixelFit) -> [f64; 2] {
    let (rows, cols) = spectrum.dim();
    let w = fit.half_width.max(1);
    let cx = peak[0].round().clamp(0.0, (cols - 1) as f64) as usize;
    let cy = peak[1].round().clamp(0.0, (rows - 1) as f64) as usize;
    let x_lo = cx.saturating_sub(w);
    let y_lo = cy.saturating_sub(w);
    let x_hi = (cx + w + 1).min(cols);
    let y_hi = (cy + w + 1).min(rows);

    let window_sum: f64 = (y_lo..y_hi)
        .flat_map(|r| (x_lo..x_hi).map(move |c| (r, c)))
        .map(|(r, c)| spectrum[[r, c]])
        .sum();
    if window_sum <= 0.0 || !window_sum.is_finite() {
        return peak;
    }

    let mut data: Vec<Sample> = Vec::with_capacity((y_hi - y_lo) * (x_hi - x_lo));
    let mut z_min = f64::INFINITY;
    let mut z_max = f64::NEG_INFINITY;
    for r in y_lo..y_hi {
        for c in x_lo..x_hi {
            let z = spectrum[[r, c]] / window_sum;
            z_min = z_min.min(z);
            z_max = z_max.max(z);
            data.push(((c - x_lo) as f64, (r - y_lo) as f64, z));
        }
    }

    let model = Gaussian2d {
        extent: [(x_hi - x_lo - 1) as f64, (y_hi - y_lo - 1) as f64],
    };
    let initial = [
        z_max - z_min,
        (cx - x_lo) as f64,
        (cy - y_lo) as f64,
        1.0,
        1.0,
        z_min,
    ];
    let config = LmConfig {
        max_iterations: fit.max_iterations,
        ..LmConfig::default()
    };
    let result = optimize(&model, &data, initial, &config);
    let [_, x0, y0, ..] = result.params;
    let refined = [x_lo as f64 + x0, y_lo as f64 + y0];
    if !refined.iter().all(|v| v.is_finite())
        || (refined[0] - peak[0]).abs() > w as f64
        || (refined[1] - peak[1]).abs() > w as f64
    {
        debug!("sub-pixel fit rejected at {peak:?}: {refined:?}");
        return peak;
    }
    refined
}
