//! Keypoint-based coarse alignment.
//!
//! Detects FAST corners on 8-bit copies of both frames, describes them with
//! oriented BRIEF, matches by Hamming distance and solves an exact affine
//! transform from the three best usable correspondences. The result is a
//! bootstrap for the direct estimator, not a final answer.

pub mod brief;
pub mod fast;
pub mod matching;

use ndarray::Array2;
use tracing::debug;

use crate::consts::{AFFINE_POINT_COUNT, DESCRIPTOR_BYTES};
use crate::error::{RegistrationError, Result};
use crate::pipeline::config::FeatureConfig;
use crate::preprocess::to_u8;
use crate::transform::AffineTransform;

pub use brief::{describe, hamming_distance};
pub use fast::detect;
pub use matching::{affine_from_points, match_features, select_triple};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    /// Column
    pub x: f32,
    /// Row
    pub y: f32,
    pub response: f32,
    /// Orientation in radians, set by [`describe`].
    pub angle: f32,
}

impl Keypoint {
    pub fn position(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

#[derive(Clone, Debug)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: [u8; DESCRIPTOR_BYTES],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: u32,
}

/// Detect and describe features of an 8-bit image.
pub fn extract_features(image: &Array2<u8>, config: &FeatureConfig) -> Vec<Feature> {
    let keypoints = detect(image, config);
    describe(image, &keypoints, config.patch_size)
}

/// Coarse affine estimation from keypoint correspondences.
#[derive(Clone, Debug)]
pub struct FeatureEstimator {
    pub config: FeatureConfig,
    pub sigma_clip: f32,
    /// Quantization window; `None` derives one per frame.
    pub bounds: Option<(f32, f32)>,
}

impl FeatureEstimator {
    pub fn new(config: FeatureConfig, sigma_clip: f32, bounds: Option<(f32, f32)>) -> Self {
        Self {
            config,
            sigma_clip,
            bounds,
        }
    }

    /// Transform mapping `prev` coordinates into `curr` coordinates.
    pub fn estimate(&self, prev: &Array2<f32>, curr: &Array2<f32>) -> Result<AffineTransform> {
        let prev_u8 = to_u8(prev, self.bounds, self.sigma_clip);
        let curr_u8 = to_u8(curr, self.bounds, self.sigma_clip);

        let prev_features = extract_features(&prev_u8, &self.config);
        let curr_features = extract_features(&curr_u8, &self.config);
        let matches = match_features(&prev_features, &curr_features);
        debug!(
            prev_features = prev_features.len(),
            curr_features = curr_features.len(),
            matches = matches.len(),
            "Feature matching"
        );

        if matches.len() < AFFINE_POINT_COUNT {
            return Err(RegistrationError::InsufficientFeatures {
                found: matches.len(),
            });
        }

        let (src, dst) = select_triple(&matches, &prev_features, &curr_features)?;
        affine_from_points(&src, &dst)
    }
}

impl Default for FeatureEstimator {
    fn default() -> Self {
        Self::new(
            FeatureConfig::default(),
            crate::consts::DEFAULT_SIGMA_CLIP,
            None,
        )
    }
}
