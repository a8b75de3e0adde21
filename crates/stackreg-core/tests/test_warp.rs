#[allow(dead_code)]
mod common;

use ndarray::Array2;

use stackreg_core::crop::common_bounds;
use stackreg_core::error::RegistrationError;
use stackreg_core::frame::Frame;
use stackreg_core::pipeline::{Registration, TransformRecord};
use stackreg_core::transform::{AffineTransform, TransformChain};
use stackreg_core::warp::{apply_transforms, bilinear_sample_nan, warp_frame};

use common::{stack_of, with_nan_border};

fn ramp(h: usize, w: usize) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| (r * 100 + c) as f32)
}

#[test]
fn test_identity_warp_is_exact() {
    let frame = Frame::new(ramp(12, 9), 4);
    let out = warp_frame(&frame, &AffineTransform::identity());
    assert_eq!(out.data, frame.data);
    assert_eq!(out.index, 4);
}

#[test]
fn test_integer_translation_marks_exposed_border_missing() {
    let frame = Frame::new(ramp(10, 10), 0);
    // out(p) = src(p + (2, 1))
    let out = warp_frame(&frame, &AffineTransform::translation(2.0, 1.0));
    assert_eq!(out.dim(), (10, 10));
    for r in 0..10 {
        for c in 0..10 {
            let v = out.data[[r, c]];
            if c + 2 < 10 && r + 1 < 10 {
                assert_eq!(v, frame.data[[r + 1, c + 2]]);
            } else {
                assert!(v.is_nan(), "({r}, {c}) should be missing");
            }
        }
    }
}

#[test]
fn test_linear_interpolation_between_samples() {
    let data = ramp(4, 4);
    // Linear data is reproduced exactly by bilinear interpolation.
    let v = bilinear_sample_nan(&data, 1.25, 2.5);
    assert!((v - (250.0 + 1.25)).abs() < 1e-4);
}

#[test]
fn test_missing_source_propagates() {
    let data = with_nan_border(ramp(6, 6), 0, 0, 0, 1);
    assert!(bilinear_sample_nan(&data, 4.5, 2.0).is_nan());
    assert_eq!(bilinear_sample_nan(&data, 4.0, 2.0), 204.0);
}

#[test]
fn test_apply_transforms_checks_chain_length() {
    let stack = stack_of(vec![ramp(5, 5), ramp(5, 5)]);
    let err = apply_transforms(&stack, &TransformChain::new()).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::ChainLengthMismatch {
            transforms: 1,
            frames: 2
        }
    ));
}

#[test]
fn test_apply_transforms_crops_then_resamples() {
    let stack = stack_of(vec![
        with_nan_border(ramp(12, 12), 1, 1, 1, 1),
        with_nan_border(ramp(12, 12), 2, 0, 0, 2),
    ]);
    let mut chain = TransformChain::new();
    chain.push(AffineTransform::translation(1.0, 0.0));
    let out = apply_transforms(&stack, &chain).unwrap();

    assert_eq!(out.len(), 2);
    // Common valid box: rows 2..=10, cols 1..=9.
    assert_eq!(out.dim(), (9, 9));
    // Frame 0 is only cropped.
    assert_eq!(out.frame(0).unwrap().data[[0, 0]], 201.0);
    // Frame 1 is shifted by one column; its last column falls outside.
    let f1 = &out.frame(1).unwrap().data;
    assert_eq!(f1[[0, 0]], 202.0);
    assert!(f1[[0, 8]].is_nan());
}

#[test]
fn test_apply_transforms_matches_reference_registration() {
    let reference = stack_of(vec![
        with_nan_border(ramp(12, 12), 1, 0, 2, 0),
        with_nan_border(ramp(12, 12), 0, 2, 0, 1),
    ]);
    let mut chain = TransformChain::new();
    chain.push(AffineTransform::translation(0.5, -1.0));
    let record = TransformRecord {
        reference_channel: "ref".into(),
        source_height: 12,
        source_width: 12,
        crop: common_bounds(&reference).unwrap(),
        chain: chain.clone(),
    };
    let registration = Registration::from_record(&record).unwrap();

    let direct = apply_transforms(&reference, &chain).unwrap();
    let via_registration = registration.apply(&reference).unwrap();
    assert_eq!(direct.dim(), via_registration.dim());
    for (a, b) in direct.iter().zip(via_registration.iter()) {
        for (x, y) in a.data.iter().zip(b.data.iter()) {
            assert!(x == y || (x.is_nan() && y.is_nan()));
        }
    }

    // A secondary channel with its own border still gets the reference crop
    // through the registration.
    let secondary = stack_of(vec![ramp(12, 12), with_nan_border(ramp(12, 12), 3, 0, 0, 0)]);
    assert_eq!(registration.apply(&secondary).unwrap().dim(), direct.dim());
    assert_ne!(apply_transforms(&secondary, &chain).unwrap().dim(), direct.dim());
}
