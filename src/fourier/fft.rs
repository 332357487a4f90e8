use ndarray::{Array2, ArrayView2, Axis};
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

fn transform_axis(data: &mut Array2<Complex64>, axis: Axis, fft: &Arc<dyn Fft<f64>>) {
    let n = data.len_of(axis);
    if n <= 1 {
        return;
    }
    let mut buf = vec![Complex64::new(0.0, 0.0); n];
    let mut scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    for mut lane in data.lanes_mut(axis) {
        for (b, v) in buf.iter_mut().zip(lane.iter()) {
            *b = *v;
        }
        fft.process_with_scratch(&mut buf, &mut scratch);
        for (v, b) in lane.iter_mut().zip(buf.iter()) {
            *v = *b;
        }
    }
}

fn transform2(data: &mut Array2<Complex64>, direction: FftDirection) {
    let (rows, cols) = data.dim();
    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft(cols, direction);
    let col_fft = planner.plan_fft(rows, direction);
    transform_axis(data, Axis(1), &row_fft);
    transform_axis(data, Axis(0), &col_fft);
}

/// Forward 2D DFT, unnormalised.
pub fn fft2(data: &Array2<Complex64>) -> Array2<Complex64> {
    let mut out = data.clone();
    transform2(&mut out, FftDirection::Forward);
    out
}

/// Forward 2D DFT of a real layer.
pub fn fft2_real(data: ArrayView2<'_, f64>) -> Array2<Complex64> {
    let mut out = data.mapv(|v| Complex64::new(v, 0.0));
    transform2(&mut out, FftDirection::Forward);
    out
}

/// Inverse 2D DFT, normalised by the number of samples.
pub fn ifft2(data: &Array2<Complex64>) -> Array2<Complex64> {
    let mut out = data.clone();
    transform2(&mut out, FftDirection::Inverse);
    let n = out.len().max(1) as f64;
    out.mapv_inplace(|v| v / n);
    out
}

/// Real part of [`ifft2`].
pub fn ifft2_real(data: &Array2<Complex64>) -> Array2<f64> {
    ifft2(data).mapv(|v| v.re)
}

fn roll2<T: Clone>(data: &Array2<T>, shift_rows: usize, shift_cols: usize) -> Array2<T> {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return data.clone();
    }
    let (sr, sc) = (shift_rows % rows, shift_cols % cols);
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        data[[(r + rows - sr) % rows, (c + cols - sc) % cols]].clone()
    })
}

/// Moves the zero-frequency bin to `(rows / 2, cols / 2)`.
pub fn fftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    roll2(data, rows / 2, cols / 2)
}

/// Inverse of [`fftshift`]; moves `(rows / 2, cols / 2)` back to the origin.
pub fn ifftshift<T: Clone>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    roll2(data, rows - rows / 2, cols - cols / 2)
}

/// Centred magnitude spectrum with the DC term removed.
///
/// The layer mean is subtracted before transforming, which zeroes the DC bin.
pub fn magnitude_spectrum(layer: ArrayView2<'_, f64>) -> Array2<f64> {
    let mean = layer.mean().unwrap_or(0.0);
    let centred = layer.mapv(|v| v - mean);
    let spectrum = fft2_real(centred.view());
    fftshift(&spectrum).mapv(|v| v.norm())
}
