//! Bragg peak detection in the centred magnitude spectrum.
//!
//! Stages
//! - Spectrum: `|FFT|` with the DC term removed (or the caller's spectrum).
//! - Masks: low-q Gaussian suppressor, axis stripes and n-fold bands,
//!   multiplied onto the spectrum.
//! - Search: local maxima with a minimum separation and relative threshold.
//! - Even-out: optional rounding of offsets to even bins.
//! - Sub-pixel: optional Gaussian fit around each integer maximum.
//!
//! [`detect_peaks`] returns every accepted maximum as `[x, y]`, strongest
//! first and unsorted by angle; [`find_bragg_peaks`] keeps the four closest to
//! the centre in canonical order.

mod fit;
mod lm;
pub mod local_max;
pub mod masks;
pub mod options;

pub use fit::refine_peak;
pub use lm::{optimize, LmConfig, LmModel, LmResult};
pub use options::{BraggOptions, SpectrumInput, SubpixelFit, SymmetryMask};

use crate::error::Result;
use crate::fourier::magnitude_spectrum;
use crate::lattice::{center_of, even_out, BraggPeakSet};
use log::debug;
use ndarray::{Array2, ArrayView2};

/// Spectrum with every configured mask applied.
pub fn masked_spectrum(layer: ArrayView2<'_, f64>, options: &BraggOptions) -> Array2<f64> {
    let mut spectrum = match options.input {
        SpectrumInput::RealSpace => magnitude_spectrum(layer),
        SpectrumInput::Fourier => layer.to_owned(),
    };
    let shape = spectrum.dim();
    if let Some(ratio) = options.low_q_mask {
        spectrum *= &masks::low_q_mask(shape, ratio);
    }
    if let Some(ratio) = options.axis_mask {
        spectrum *= &masks::axis_mask(shape, ratio);
    }
    if let Some(mask) = &options.symmetry_mask {
        spectrum *= &masks::symmetry_mask(shape, mask);
    }
    spectrum
}

/// All maxima passing the thresholds, as `[x, y]` pixel coordinates.
pub fn detect_peaks(layer: ArrayView2<'_, f64>, options: &BraggOptions) -> Vec<[f64; 2]> {
    let spectrum = masked_spectrum(layer, options);
    let maxima = local_max::peak_local_max(spectrum.view(), options.min_dist, options.threshold_rel);
    let mut coords: Vec<[f64; 2]> = maxima
        .iter()
        .map(|m| [m.col as f64, m.row as f64])
        .collect();
    if options.even_out {
        even_out(&mut coords, center_of(spectrum.dim()));
    }
    if let Some(fit) = &options.subpixel {
        for c in coords.iter_mut() {
            *c = refine_peak(spectrum.view(), *c, fit);
        }
    }
    debug!(
        "bragg detection: {} maxima (min_dist={} thres={:.3})",
        coords.len(),
        options.min_dist,
        options.threshold_rel
    );
    coords
}

/// Four peaks nearest the spectrum centre, in canonical order.
pub fn find_bragg_peaks(layer: ArrayView2<'_, f64>, options: &BraggOptions) -> Result<BraggPeakSet> {
    let coords = detect_peaks(layer, options);
    let set = BraggPeakSet::from_detections(&coords, layer.dim())?;
    debug!("bragg peaks {:?} q={:?}", set.peaks(), set.q_vectors());
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriftError;
    use std::f64::consts::PI;

    fn lattice(n: usize, k: f64) -> Array2<f64> {
        Array2::from_shape_fn((n, n), |(r, c)| {
            let w = 2.0 * PI * k / n as f64;
            (w * (c as f64 + r as f64)).cos() + (w * (c as f64 - r as f64)).cos()
        })
    }

    #[test]
    fn finds_square_lattice_peaks() {
        let img = lattice(64, 8.0);
        let set = find_bragg_peaks(img.view(), &BraggOptions::default()).unwrap();
        assert_eq!(
            set.q_vectors(),
            [[-8.0, -8.0], [8.0, -8.0], [8.0, 8.0], [-8.0, 8.0]]
        );
    }

    #[test]
    fn precomputed_spectrum_gives_the_same_peaks() {
        let img = lattice(64, 8.0);
        let spectrum = magnitude_spectrum(img.view());
        let options = BraggOptions {
            input: SpectrumInput::Fourier,
            ..BraggOptions::default()
        };
        let from_spectrum = find_bragg_peaks(spectrum.view(), &options).unwrap();
        let from_layer = find_bragg_peaks(img.view(), &BraggOptions::default()).unwrap();
        assert_eq!(from_spectrum, from_layer);
    }

    #[test]
    fn even_out_moves_odd_peaks_outwards() {
        let img = lattice(64, 9.0);
        let options = BraggOptions {
            even_out: true,
            ..BraggOptions::default()
        };
        let set = find_bragg_peaks(img.view(), &options).unwrap();
        assert_eq!(
            set.q_vectors(),
            [[-10.0, -10.0], [10.0, -10.0], [10.0, 10.0], [-10.0, 10.0]]
        );
    }

    #[test]
    fn flat_image_has_no_peaks() {
        let img = Array2::from_elem((32, 32), 3.0);
        let err = find_bragg_peaks(img.view(), &BraggOptions::default()).unwrap_err();
        assert!(matches!(err, DriftError::InsufficientPeaks { .. }));
    }

    #[test]
    fn symmetry_mask_selects_the_other_family() {
        let n = 64;
        let axis = Array2::from_shape_fn((n, n), |(r, c)| {
            let w = 2.0 * PI * 12.0 / n as f64;
            0.6 * ((w * c as f64).cos() + (w * r as f64).cos())
        });
        let img = lattice(n, 8.0) + &axis;
        let unmasked = find_bragg_peaks(img.view(), &BraggOptions::default()).unwrap();
        assert_eq!(unmasked.q_vectors()[0], [-8.0, -8.0]);

        let options = BraggOptions {
            symmetry_mask: Some(SymmetryMask {
                order: 4,
                offset: PI / 4.0,
                width: 2.0,
            }),
            ..BraggOptions::default()
        };
        let masked = find_bragg_peaks(img.view(), &options).unwrap();
        assert_eq!(
            masked.q_vectors(),
            [[0.0, -12.0], [12.0, 0.0], [0.0, 12.0], [-12.0, 0.0]]
        );
    }

    #[test]
    fn subpixel_refinement_stays_on_integer_peaks() {
        let img = lattice(64, 8.0);
        let options = BraggOptions {
            subpixel: Some(SubpixelFit {
                half_width: 3,
                max_iterations: 50,
            }),
            ..BraggOptions::default()
        };
        let set = find_bragg_peaks(img.view(), &options).unwrap();
        for (q, e) in set
            .q_vectors()
            .iter()
            .zip([[-8.0, -8.0], [8.0, -8.0], [8.0, 8.0], [-8.0, 8.0]])
        {
            assert!((q[0] - e[0]).abs() < 0.05 && (q[1] - e[1]).abs() < 0.05, "{q:?}");
        }
    }
}
