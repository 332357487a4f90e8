mod common;

use common::synthetic_image::{diagonal_lattice_at, sinusoidal_drift};
use lattice_drift::crop::{CropSpec, Margins};
use lattice_drift::drift::apply_drift;
use lattice_drift::phase::{PhaseMethod, Sigma};
use lattice_drift::shear::{ShearOptions, ShearTarget};
use lattice_drift::{
    apply_drift_parameters, find_drift_parameters, DriftCorrector, DriftError,
    DriftParameterBundle, DriftParams, Image, NoProgress, ProgressCounter,
};
use ndarray::{stack, Array2, Axis};

fn calibrated(params: DriftParams) -> (Array2<f64>, lattice_drift::Calibration) {
    let n = 128;
    let observed = diagonal_lattice_at(n, 8.0, sinusoidal_drift(n, [0.1, 0.05], [0.4, 0.3]));
    let calibration = find_drift_parameters(observed.view(), &params).unwrap();
    (observed, calibration)
}

fn lock_in() -> DriftParams {
    DriftParams {
        sigma: Sigma::Uniform(5.0),
        ..DriftParams::default()
    }
}

#[test]
fn replay_on_the_reference_reproduces_calibration() {
    let (observed, calibration) = calibrated(DriftParams {
        pre_crop: Margins::Edges([2, 0, 1, 3]),
        post_crop: Some(CropSpec::commensurate(Margins::Uniform(4))),
        ..lock_in()
    });
    let replayed = apply_drift_parameters(
        &Image::Single(observed),
        &calibration.bundle,
        &NoProgress,
    )
    .unwrap()
    .into_single()
    .unwrap();
    assert_eq!(replayed, calibration.corrected);
}

#[test]
fn replay_uses_the_recorded_field_only() {
    let (observed, calibration) = calibrated(lock_in());
    // A second channel of the same acquisition, with other contrast.
    let other = observed.mapv(|v| 3.0 * v * v - 1.0);
    let replayed = apply_drift_parameters(
        &Image::Single(other.clone()),
        &calibration.bundle,
        &NoProgress,
    )
    .unwrap()
    .into_single()
    .unwrap();
    let bundle = &calibration.bundle;
    let direct = apply_drift(
        other.view(),
        bundle.field(),
        bundle.correction(),
        bundle.interpolation(),
    )
    .unwrap();
    assert_eq!(replayed, direct);
}

#[test]
fn stack_layers_share_one_correction() {
    let (observed, calibration) = calibrated(lock_in());
    let layers: Vec<Array2<f64>> = (0..3).map(|i| observed.mapv(|v| v * (i + 1) as f64)).collect();
    let views: Vec<_> = layers.iter().map(|l| l.view()).collect();
    let cube = stack(Axis(0), &views).unwrap();

    let progress = ProgressCounter::new();
    let out = apply_drift_parameters(&Image::Stack(cube), &calibration.bundle, &progress)
        .unwrap()
        .into_stack()
        .unwrap();
    assert_eq!(out.dim(), (3, 128, 128));
    assert!(progress.completed() >= 3);
    for (i, layer) in out.axis_iter(Axis(0)).enumerate() {
        let scale = (i + 1) as f64;
        for (a, b) in layer.iter().zip(calibration.corrected.iter()) {
            assert!((a - scale * b).abs() < 1e-9);
        }
    }
}

#[test]
fn shear_is_replayed_from_the_bundle() {
    let (observed, calibration) = calibrated(DriftParams {
        shear: Some(ShearTarget::Ideal(ShearOptions::default())),
        ..lock_in()
    });
    assert!(calibration.bundle.shear().is_some());
    let replayed = apply_drift_parameters(
        &Image::Single(observed),
        &calibration.bundle,
        &NoProgress,
    )
    .unwrap();
    assert_eq!(replayed.as_single().unwrap(), &calibration.corrected);
}

#[test]
fn mismatched_layers_are_rejected() {
    let (_, calibration) = calibrated(lock_in());
    let wrong = Array2::<f64>::zeros((100, 128));
    let err = apply_drift_parameters(&Image::Single(wrong), &calibration.bundle, &NoProgress)
        .unwrap_err();
    assert!(matches!(
        err,
        DriftError::ShapeMismatch {
            expected: (128, 128),
            found: (100, 128)
        }
    ));
}

#[test]
fn cancelled_replay_stops() {
    let (observed, calibration) = calibrated(lock_in());
    let cube = stack(Axis(0), &[observed.view(), observed.view()]).unwrap();
    let progress = ProgressCounter::new();
    progress.cancel();
    let err = apply_drift_parameters(&Image::Stack(cube), &calibration.bundle, &progress)
        .unwrap_err();
    assert!(matches!(err, DriftError::Cancelled { total: 2, .. }));
}

#[test]
fn bundle_survives_json() {
    let (observed, calibration) = calibrated(DriftParams {
        post_crop: Some(CropSpec::commensurate(Margins::Uniform(4))),
        ..lock_in()
    });
    let json = serde_json::to_string(&calibration.bundle).unwrap();
    let restored: DriftParameterBundle = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.source_shape(), (128, 128));
    assert_eq!(restored.output_shape(), calibration.corrected.dim());

    let session = DriftCorrector::new(DriftParams::default()).with_bundle(restored);
    let out = session
        .apply(&Image::Single(observed), &NoProgress)
        .unwrap()
        .into_single()
        .unwrap();
    for (a, b) in out.iter().zip(calibration.corrected.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn convolution_bundle_replays_with_inverse_fourier() {
    let n = 48;
    let observed = diagonal_lattice_at(n, 6.0, sinusoidal_drift(n, [0.2, 0.15], [0.1, 0.1]));
    let params = DriftParams {
        method: PhaseMethod::Convolution,
        sigma: Sigma::Uniform(3.0),
        ..DriftParams::default()
    };
    let calibration = find_drift_parameters(observed.view(), &params).unwrap();
    let replayed = apply_drift_parameters(
        &Image::Single(observed),
        &calibration.bundle,
        &NoProgress,
    )
    .unwrap();
    assert_eq!(replayed.as_single().unwrap(), &calibration.corrected);
}

#[test]
fn session_without_calibration_refuses_to_apply() {
    let session = DriftCorrector::new(DriftParams::default());
    let err = session
        .apply(&Image::Single(Array2::zeros((8, 8))), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, DriftError::Configuration(_)));
}
