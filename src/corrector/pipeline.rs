//! Calibration and replay of the drift correction.
//!
//! [`find_drift_parameters`] measures a reference layer and returns the
//! corrected layer, the replayable [`DriftParameterBundle`] and a report.
//! [`apply_drift_parameters`] repeats the recorded crops, shear and drift
//! field on any image with the same layer shape. Replay never detects peaks,
//! so applying a bundle to its own reference layer reproduces the
//! calibration output exactly.

use super::bundle::DriftParameterBundle;
use super::params::DriftParams;
use crate::angle::snap_lattice_angle;
use crate::bragg::{find_bragg_peaks, SpectrumInput};
use crate::crop::{apply_crop, crop_layer, plan_crop, CropSpec};
use crate::diagnostics::report::value_range;
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{CalibrationReport, DriftSummary, PeakSummary, TimingBreakdown};
use crate::drift::{apply_drift, apply_drift_image, drift_field};
use crate::error::Result;
use crate::image::{Image, LayerProgress};
use crate::lattice::BraggPeakSet;
use crate::phase::{phase_map, unwrap_phase};
use crate::shear::{apply_shear, apply_shear_image, matrix_rows, shear_matrix};
use log::debug;
use nalgebra::Matrix2x3;
use ndarray::{Array2, ArrayView2};
use std::time::Instant;

/// Output of one calibration.
#[derive(Clone, Debug)]
pub struct Calibration {
    pub corrected: Array2<f64>,
    pub bundle: DriftParameterBundle,
    pub report: CalibrationReport,
}

/// Calibrates the drift correction on a 2D reference layer.
///
/// Stages: pre-crop, optional global shear (followed by a new detection),
/// Bragg detection, ideal lattice, phase maps, unwrapping, drift field,
/// correction and optional post-crop measured on the corrected layer.
pub fn find_drift_parameters(
    reference: ArrayView2<'_, f64>,
    params: &DriftParams,
) -> Result<Calibration> {
    let total_start = Instant::now();
    let mut timings = TimingBreakdown::default();
    let mut clock = Instant::now();
    debug!(
        "find_drift_parameters start shape={:?} method={:?}",
        reference.dim(),
        params.method
    );

    let pre_crop = plan_crop(
        reference,
        &CropSpec::margins(params.pre_crop),
        None,
        &params.bragg,
    )?;
    let mut work = crop_layer(reference, &pre_crop)?;
    timings.lap("pre_crop", &mut clock);

    let mut shear = None;
    if let Some(target) = &params.shear {
        let before = find_bragg_peaks(work.view(), &params.bragg)?;
        let matrix = shear_matrix(&before, target)?;
        debug!("global shear {:?}", matrix_rows(&matrix));
        work = apply_shear(work.view(), &matrix, SpectrumInput::RealSpace)?;
        shear = Some(matrix_rows(&matrix));
        timings.lap("shear", &mut clock);
    }

    let frame = work.dim();
    let (raw_peaks, ideal_peaks, angle, orient) = match &params.ideal_peaks {
        Some(given) => {
            let mut ideal = BraggPeakSet::new(*given.peaks(), given.shape());
            if ideal.shape() != frame {
                ideal = ideal.rescaled_to(frame);
            }
            let raw = if shear.is_some() {
                find_bragg_peaks(work.view(), &params.bragg)?
            } else {
                ideal.clone()
            };
            let angle = params.angle.unwrap_or_else(|| ideal.inter_peak_angle());
            let orient = params.orient.unwrap_or_else(|| ideal.orientation());
            (raw, ideal, angle, orient)
        }
        None => {
            let raw = find_bragg_peaks(work.view(), &params.bragg)?;
            timings.lap("bragg", &mut clock);
            let angle = params
                .angle
                .unwrap_or_else(|| snap_lattice_angle(raw.inter_peak_angle()));
            let orient = params.orient.unwrap_or_else(|| raw.orientation());
            let ideal = raw.generate_ideal(angle, Some(orient), params.even_out);
            (raw, ideal, angle, orient)
        }
    };
    timings.lap("ideal_lattice", &mut clock);

    let maps = phase_map(work.view(), &ideal_peaks, params.sigma, params.method)?;
    timings.lap("phase_map", &mut clock);
    let phases = [
        unwrap_phase(&maps.theta[0], &params.unwrap),
        unwrap_phase(&maps.theta[1], &params.unwrap),
    ];
    timings.lap("unwrap", &mut clock);
    let field = drift_field(&phases, maps.q, params.method, params.convolution_sign)?;
    timings.lap("drift_field", &mut clock);

    let correction = params.correction_method();
    let corrected = apply_drift(work.view(), &field, correction, params.interpolation)?;
    timings.lap("correction", &mut clock);

    let (output, post_crop, output_peaks) = match &params.post_crop {
        Some(spec) => {
            let peaks = if spec.commensurate {
                Some(find_bragg_peaks(corrected.view(), &params.bragg)?)
            } else {
                None
            };
            let plan = plan_crop(corrected.view(), spec, peaks.as_ref(), &params.bragg)?;
            let output = crop_layer(corrected.view(), &plan)?;
            let mapped = peaks.map(|p| plan.map_peaks(&p));
            (output, Some(plan), mapped)
        }
        None => (corrected, None, None),
    };
    timings.lap("post_crop", &mut clock);
    timings.total_ms = elapsed_ms(total_start);

    let period = post_crop
        .as_ref()
        .and_then(|plan| plan.frame.map(|f| f.resampled_period(plan.output_shape())));
    let report = CalibrationReport {
        input: reference.dim().into(),
        timings,
        raw_peaks: PeakSummary::from(&raw_peaks),
        ideal_peaks: PeakSummary::from(&ideal_peaks),
        angle,
        orient,
        shear,
        phase_ranges: [value_range(&phases[0]), value_range(&phases[1])],
        drift: DriftSummary::from(&field),
        output: output.dim().into(),
        period,
    };
    debug!(
        "find_drift_parameters done in {:.1} ms: output={:?} max|u|={:.3}",
        report.timings.total_ms, report.output, report.drift.max_magnitude
    );

    let bundle = DriftParameterBundle {
        pre_crop,
        shear,
        bragg: params.bragg.clone(),
        method: params.method,
        correction,
        interpolation: params.interpolation,
        sigma: params.sigma,
        angle,
        orient,
        raw_peaks,
        ideal_peaks,
        phases,
        field,
        post_crop,
        output_peaks,
    };
    Ok(Calibration {
        corrected: output,
        bundle,
        report,
    })
}

/// Replays a calibration on every layer of `image`.
///
/// Layers must have the bundle's source shape; otherwise the replay fails
/// with a shape mismatch before any layer is processed.
pub fn apply_drift_parameters(
    image: &Image,
    bundle: &DriftParameterBundle,
    progress: &dyn LayerProgress,
) -> Result<Image> {
    let start = Instant::now();
    let mut out = apply_crop(image, &bundle.pre_crop, progress)?;
    if let Some(m) = bundle.shear {
        let matrix = Matrix2x3::new(m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2]);
        out = apply_shear_image(&out, &matrix, SpectrumInput::RealSpace, progress)?;
    }
    out = apply_drift_image(
        &out,
        &bundle.field,
        bundle.correction,
        bundle.interpolation,
        progress,
    )?;
    if let Some(plan) = &bundle.post_crop {
        out = apply_crop(&out, plan, progress)?;
    }
    debug!(
        "apply_drift_parameters: {} layer(s) in {:.1} ms",
        out.layer_count(),
        elapsed_ms(start)
    );
    Ok(out)
}
