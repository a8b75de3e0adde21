#[allow(dead_code)]
mod common;

use ndarray::Array2;

use stackreg_core::direct::DirectEstimator;
use stackreg_core::error::RegistrationError;
use stackreg_core::pipeline::config::{DirectConfig, MotionModel};
use stackreg_core::transform::AffineTransform;

use common::{blob_canvas, noise, shifted_window};

fn precise(motion: MotionModel) -> DirectEstimator {
    DirectEstimator::new(DirectConfig {
        motion,
        max_iterations: 100,
        epsilon: 1e-6,
        ..DirectConfig::default()
    })
}

#[test]
fn test_identical_frames_give_identity() {
    let canvas = blob_canvas(96, 96, 7);
    let result = precise(MotionModel::Euclidean)
        .estimate(&canvas, &canvas, &AffineTransform::identity())
        .unwrap();
    assert!(result.transform.is_identity(1e-3), "{:?}", result.transform);
    assert!(result.correlation > 0.999);
}

#[test]
fn test_recovers_integer_translation() {
    let canvas = blob_canvas(120, 120, 11);
    let prev = shifted_window(&canvas, 12, 96, 96, 0, 0);
    let curr = shifted_window(&canvas, 12, 96, 96, 3, -2);

    let result = precise(MotionModel::Euclidean)
        .estimate(&prev, &curr, &AffineTransform::identity())
        .unwrap();
    let (tx, ty) = result.transform.translation_part();
    assert!((tx - 3.0).abs() < 0.2, "tx = {tx}");
    assert!((ty + 2.0).abs() < 0.2, "ty = {ty}");
    assert!(result.transform.rotation().abs() < 0.01);
    assert!(result.iterations >= 1);
}

#[test]
fn test_translation_model_recovers_shift() {
    let canvas = blob_canvas(120, 120, 5);
    let prev = shifted_window(&canvas, 12, 96, 96, 0, 0);
    let curr = shifted_window(&canvas, 12, 96, 96, -2, 1);

    let result = precise(MotionModel::Translation)
        .estimate(&prev, &curr, &AffineTransform::identity())
        .unwrap();
    let r = result.transform.rows();
    assert_eq!((r[0][0], r[0][1], r[1][0], r[1][1]), (1.0, 0.0, 0.0, 1.0));
    assert!((r[0][2] + 2.0).abs() < 0.2);
    assert!((r[1][2] - 1.0).abs() < 0.2);
}

#[test]
fn test_affine_model_recovers_shift() {
    let canvas = blob_canvas(120, 120, 9);
    let prev = shifted_window(&canvas, 12, 96, 96, 0, 0);
    let curr = shifted_window(&canvas, 12, 96, 96, 2, 2);

    let result = precise(MotionModel::Affine)
        .estimate(&prev, &curr, &AffineTransform::identity())
        .unwrap();
    let (tx, ty) = result.transform.translation_part();
    assert!((tx - 2.0).abs() < 0.3, "tx = {tx}");
    assert!((ty - 2.0).abs() < 0.3, "ty = {ty}");
}

#[test]
fn test_good_initial_guess_is_refined() {
    let canvas = blob_canvas(140, 140, 21);
    let prev = shifted_window(&canvas, 20, 96, 96, 0, 0);
    let curr = shifted_window(&canvas, 20, 96, 96, 15, 10);

    let init = AffineTransform::translation(14.4, 10.5);
    let result = precise(MotionModel::Euclidean)
        .estimate(&prev, &curr, &init)
        .unwrap();
    let (tx, ty) = result.transform.translation_part();
    assert!((tx - 15.0).abs() < 0.2, "tx = {tx}");
    assert!((ty - 10.0).abs() < 0.2, "ty = {ty}");
}

#[test]
fn test_missing_values_rejected_before_numerics() {
    let canvas = blob_canvas(64, 64, 1);
    let mut curr = canvas.clone();
    curr[[10, 10]] = f32::NAN;
    let err = DirectEstimator::default()
        .estimate(&canvas, &curr, &AffineTransform::identity())
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidInput(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_shape_mismatch_rejected() {
    let a = Array2::<f32>::zeros((10, 10));
    let b = Array2::<f32>::zeros((10, 12));
    let err = DirectEstimator::default()
        .estimate(&a, &b, &AffineTransform::identity())
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ShapeMismatch { .. }));
}

#[test]
fn test_uncorrelated_frames_do_not_converge() {
    let prev = noise(64, 64, 100);
    let curr = noise(64, 64, 200);
    let err = DirectEstimator::default()
        .estimate(&prev, &curr, &AffineTransform::identity())
        .unwrap_err();
    assert!(
        matches!(err, RegistrationError::ConvergenceFailure(_)),
        "unexpected error {err}"
    );
}

#[test]
fn test_flat_frames_do_not_converge() {
    let flat = Array2::<f32>::from_elem((32, 32), 0.5);
    let err = DirectEstimator::default()
        .estimate(&flat, &flat, &AffineTransform::identity())
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ConvergenceFailure(_)));
}
