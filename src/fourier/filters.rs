use super::fft::{fft2, fft2_real, ifft2, ifft2_real};
use ndarray::{Array2, ArrayView2};
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Signed frequency index of unshifted bin `k` in a transform of length `n`.
///
/// Matches the centred index after [`super::fftshift`], so the Nyquist bin of an
/// even length maps to `-n / 2`.
#[inline]
pub fn signed_frequency(k: usize, n: usize) -> f64 {
    if k < n - n / 2 {
        k as f64
    } else {
        k as f64 - n as f64
    }
}

/// Rotated anisotropic 2D Gaussian sampled on a `(rows, cols)` grid.
///
/// `center` and `sigma` are given as `[x, y]`; `theta` rotates the `x` axis
/// of the Gaussian counter-clockwise.
pub fn gaussian2d(
    shape: (usize, usize),
    center: [f64; 2],
    sigma: [f64; 2],
    theta: f64,
    amplitude: f64,
) -> Array2<f64> {
    let (sx, sy) = (sigma[0].max(f64::EPSILON), sigma[1].max(f64::EPSILON));
    let (cos, sin) = (theta.cos(), theta.sin());
    let a = cos * cos / (2.0 * sx * sx) + sin * sin / (2.0 * sy * sy);
    let b = -(2.0 * theta).sin() / (4.0 * sx * sx) + (2.0 * theta).sin() / (4.0 * sy * sy);
    let c = sin * sin / (2.0 * sx * sx) + cos * cos / (2.0 * sy * sy);
    Array2::from_shape_fn(shape, |(r, col)| {
        let dx = col as f64 - center[0];
        let dy = r as f64 - center[1];
        amplitude * (-(a * dx * dx + 2.0 * b * dx * dy + c * dy * dy)).exp()
    })
}

/// Keeps the low-frequency band of a real layer.
///
/// The spectrum is weighted by a Gaussian centred on DC whose widths
/// `sigma = [sigma_x, sigma_y]` are given in frequency bins; the real part of
/// the inverse transform is returned.
pub fn fourier_lowpass(layer: ArrayView2<'_, f64>, sigma: [f64; 2]) -> Array2<f64> {
    let (rows, cols) = layer.dim();
    let (sx, sy) = (sigma[0].max(f64::EPSILON), sigma[1].max(f64::EPSILON));
    let mut spectrum = fft2_real(layer);
    for ((r, c), v) in spectrum.indexed_iter_mut() {
        let fx = signed_frequency(c, cols);
        let fy = signed_frequency(r, rows);
        *v *= (-(fx * fx) / (2.0 * sx * sx) - (fy * fy) / (2.0 * sy * sy)).exp();
    }
    ifft2_real(&spectrum)
}

/// Circular convolution of a complex field with a unit-area Gaussian of
/// real-space widths `sigma = [sigma_x, sigma_y]` pixels.
pub fn gaussian_smooth_complex(data: &Array2<Complex64>, sigma: [f64; 2]) -> Array2<Complex64> {
    let (rows, cols) = data.dim();
    let mut spectrum = fft2(data);
    for ((r, c), v) in spectrum.indexed_iter_mut() {
        let fx = signed_frequency(c, cols) / cols as f64;
        let fy = signed_frequency(r, rows) / rows as f64;
        let w = -2.0 * PI * PI * (sigma[0] * sigma[0] * fx * fx + sigma[1] * sigma[1] * fy * fy);
        *v *= w.exp();
    }
    ifft2(&spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_frequency_matches_shift() {
        let even: Vec<f64> = (0..4).map(|k| signed_frequency(k, 4)).collect();
        assert_eq!(even, vec![0.0, 1.0, -2.0, -1.0]);
        let odd: Vec<f64> = (0..5).map(|k| signed_frequency(k, 5)).collect();
        assert_eq!(odd, vec![0.0, 1.0, 2.0, -2.0, -1.0]);
    }

    #[test]
    fn gaussian_peaks_at_center() {
        let g = gaussian2d((9, 11), [5.0, 4.0], [1.5, 2.0], 0.0, 3.0);
        assert!((g[[4, 5]] - 3.0).abs() < 1e-12);
        assert!(g[[4, 6]] < 3.0);
        assert!((g[[4, 6]] - g[[4, 4]]).abs() < 1e-12);
    }

    #[test]
    fn lowpass_keeps_constant_and_removes_fast_wave() {
        let a = Array2::from_shape_fn((32, 32), |(_, c)| {
            2.0 + (2.0 * PI * 8.0 * c as f64 / 32.0).cos()
        });
        let f = fourier_lowpass(a.view(), [1.0, 1.0]);
        for v in f.iter() {
            assert!((v - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn complex_smoothing_preserves_constant_field() {
        let a = Array2::from_elem((16, 12), Complex64::new(0.5, -0.25));
        let s = gaussian_smooth_complex(&a, [2.0, 3.0]);
        for v in s.iter() {
            assert!((v - Complex64::new(0.5, -0.25)).norm() < 1e-9);
        }
    }
}
