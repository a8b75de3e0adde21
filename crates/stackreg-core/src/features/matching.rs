//! Descriptor matching and the minimal three-point affine solve.

use nalgebra::{Matrix3, Vector3};

use crate::consts::{AFFINE_POINT_COUNT, EPSILON, MIN_TRIANGLE_AREA};
use crate::error::{RegistrationError, Result};
use crate::transform::AffineTransform;

use super::brief::hamming_distance;
use super::{Feature, FeatureMatch};

/// Brute-force Hamming matching: for every query feature, the train feature
/// with the smallest distance (first one on ties). Sorted best first.
pub fn match_features(query: &[Feature], train: &[Feature]) -> Vec<FeatureMatch> {
    if train.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<FeatureMatch> = query
        .iter()
        .enumerate()
        .filter_map(|(query_idx, q)| {
            train
                .iter()
                .enumerate()
                .map(|(train_idx, t)| (train_idx, hamming_distance(&q.descriptor, &t.descriptor)))
                .min_by_key(|&(_, d)| d)
                .map(|(train_idx, distance)| FeatureMatch {
                    query_idx,
                    train_idx,
                    distance,
                })
        })
        .collect();

    matches.sort_by_key(|m| m.distance);
    matches
}

/// Twice the signed area of the triangle (a, b, c).
fn doubled_area(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Pick the three best matches usable for an exact affine solve: walking
/// the sorted list, skip matches that repeat a point already chosen or that
/// would make either triangle collinear.
pub fn select_triple(
    matches: &[FeatureMatch],
    query: &[Feature],
    train: &[Feature],
) -> Result<([(f64, f64); 3], [(f64, f64); 3])> {
    if matches.len() < AFFINE_POINT_COUNT {
        return Err(RegistrationError::InsufficientFeatures {
            found: matches.len(),
        });
    }

    let mut src: Vec<(f64, f64)> = Vec::with_capacity(AFFINE_POINT_COUNT);
    let mut dst: Vec<(f64, f64)> = Vec::with_capacity(AFFINE_POINT_COUNT);

    for m in matches {
        let s = query[m.query_idx].keypoint.position();
        let d = train[m.train_idx].keypoint.position();

        let repeats = src
            .iter()
            .zip(&dst)
            .any(|(ps, pd)| same_point(*ps, s) || same_point(*pd, d));
        if repeats {
            continue;
        }
        if src.len() == 2 {
            let area_src = doubled_area(src[0], src[1], s).abs() / 2.0;
            let area_dst = doubled_area(dst[0], dst[1], d).abs() / 2.0;
            if area_src < MIN_TRIANGLE_AREA || area_dst < MIN_TRIANGLE_AREA {
                continue;
            }
        }

        src.push(s);
        dst.push(d);
        if src.len() == AFFINE_POINT_COUNT {
            return Ok(([src[0], src[1], src[2]], [dst[0], dst[1], dst[2]]));
        }
    }

    Err(RegistrationError::DegenerateCorrespondence(format!(
        "no non-collinear triple among {} matches",
        matches.len()
    )))
}

fn same_point(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() < 1.0 && (a.1 - b.1).abs() < 1.0
}

/// The unique affine transform mapping three `src` points onto three `dst`
/// points.
pub fn affine_from_points(
    src: &[(f64, f64); 3],
    dst: &[(f64, f64); 3],
) -> Result<AffineTransform> {
    let a = Matrix3::new(
        src[0].0, src[0].1, 1.0, //
        src[1].0, src[1].1, 1.0, //
        src[2].0, src[2].1, 1.0,
    );
    if a.determinant().abs() < EPSILON {
        return Err(RegistrationError::DegenerateCorrespondence(
            "source points are collinear".into(),
        ));
    }
    let lu = a.lu();
    let bx = Vector3::new(dst[0].0, dst[1].0, dst[2].0);
    let by = Vector3::new(dst[0].1, dst[1].1, dst[2].1);
    let (Some(row_x), Some(row_y)) = (lu.solve(&bx), lu.solve(&by)) else {
        return Err(RegistrationError::DegenerateCorrespondence(
            "affine system is singular".into(),
        ));
    };

    let transform = AffineTransform::from_rows([
        [row_x[0], row_x[1], row_x[2]],
        [row_y[0], row_y[1], row_y[2]],
    ]);
    if !transform.is_finite() {
        return Err(RegistrationError::DegenerateCorrespondence(
            "affine solve produced non-finite values".into(),
        ));
    }
    Ok(transform)
}
