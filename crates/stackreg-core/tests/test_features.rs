#[allow(dead_code)]
mod common;

use ndarray::Array2;

use stackreg_core::error::RegistrationError;
use stackreg_core::features::{
    affine_from_points, describe, detect, extract_features, match_features, FeatureEstimator,
};
use stackreg_core::pipeline::config::FeatureConfig;
use stackreg_core::preprocess::to_u8;
use stackreg_core::transform::AffineTransform;

use common::{rect_canvas, shifted_window};

fn quantized(data: &Array2<f32>) -> Array2<u8> {
    to_u8(data, Some((0.0, 0.9)), 2.0)
}

// ---------------------------------------------------------------------------
// Detection and description
// ---------------------------------------------------------------------------

#[test]
fn test_detect_respects_budget_and_border() {
    let image = quantized(&rect_canvas(160, 160, 3));
    let config = FeatureConfig {
        max_features: 25,
        ..FeatureConfig::default()
    };
    let kps = detect(&image, &config);
    assert!(!kps.is_empty());
    assert!(kps.len() <= 25);
    let border = (config.patch_size / 2) as f32;
    for kp in &kps {
        assert!(kp.x >= border && kp.x < 160.0 - border);
        assert!(kp.y >= border && kp.y < 160.0 - border);
    }
    // Strongest first.
    for pair in kps.windows(2) {
        assert!(pair[0].response >= pair[1].response);
    }
}

#[test]
fn test_descriptors_are_translation_invariant() {
    let canvas = rect_canvas(200, 200, 8);
    let a = quantized(&shifted_window(&canvas, 20, 160, 160, 0, 0));
    let b = quantized(&shifted_window(&canvas, 20, 160, 160, 5, 3));

    let config = FeatureConfig::default();
    let fa = extract_features(&a, &config);
    let fb = extract_features(&b, &config);
    assert!(!fa.is_empty() && !fb.is_empty());

    // Some keypoint of `a` reappears shifted in `b` with the same descriptor.
    let same = fa.iter().any(|f| {
        fb.iter().any(|g| {
            g.keypoint.x == f.keypoint.x + 5.0
                && g.keypoint.y == f.keypoint.y + 3.0
                && g.descriptor == f.descriptor
        })
    });
    assert!(same);
}

#[test]
fn test_describe_sets_orientation() {
    let image = quantized(&rect_canvas(160, 160, 4));
    let config = FeatureConfig::default();
    let kps = detect(&image, &config);
    let features = describe(&image, &kps, config.patch_size);
    assert_eq!(features.len(), kps.len());
    assert!(features.iter().all(|f| f.keypoint.angle.is_finite()));
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[test]
fn test_self_match_is_exact_and_sorted() {
    let image = quantized(&rect_canvas(160, 160, 12));
    let features = extract_features(&image, &FeatureConfig::default());
    let matches = match_features(&features, &features);
    assert_eq!(matches.len(), features.len());
    assert!(matches.iter().all(|m| m.distance == 0));
    for pair in matches.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[test]
fn test_matching_against_nothing() {
    let image = quantized(&rect_canvas(160, 160, 12));
    let features = extract_features(&image, &FeatureConfig::default());
    assert!(match_features(&features, &[]).is_empty());
    assert!(match_features(&[], &features).is_empty());
}

// ---------------------------------------------------------------------------
// Three-point solve
// ---------------------------------------------------------------------------

#[test]
fn test_affine_from_points_exact() {
    let t = AffineTransform::from_rows([[1.2, -0.3, 4.0], [0.2, 0.9, -1.5]]);
    let src = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)];
    let dst = src.map(|(x, y)| t.apply(x, y));
    let solved = affine_from_points(&src, &dst).unwrap();
    for (a, b) in solved.rows().iter().flatten().zip(t.rows().iter().flatten()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_affine_from_collinear_points_fails() {
    let src = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
    let dst = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
    let err = affine_from_points(&src, &dst).unwrap_err();
    assert!(matches!(err, RegistrationError::DegenerateCorrespondence(_)));
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

#[test]
fn test_estimator_recovers_translation() {
    let canvas = rect_canvas(200, 200, 31);
    let prev = shifted_window(&canvas, 20, 160, 160, 0, 0);
    let curr = shifted_window(&canvas, 20, 160, 160, 12, 7);

    let estimator = FeatureEstimator::new(FeatureConfig::default(), 2.0, Some((0.0, 0.9)));
    let t = estimator.estimate(&prev, &curr).unwrap();
    let (tx, ty) = t.translation_part();
    assert!((tx - 12.0).abs() < 1e-6, "tx = {tx}");
    assert!((ty - 7.0).abs() < 1e-6, "ty = {ty}");
}

#[test]
fn test_featureless_frames_are_insufficient() {
    let flat = Array2::<f32>::from_elem((100, 100), 0.3);
    let err = FeatureEstimator::default().estimate(&flat, &flat).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::InsufficientFeatures { found: 0 }
    ));
    assert!(err.is_recoverable());
}
