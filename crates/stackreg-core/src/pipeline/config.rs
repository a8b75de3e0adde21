use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_ECC_EPSILON, DEFAULT_ECC_GAUSS_SIZE, DEFAULT_ECC_MAX_ITERATIONS, DEFAULT_FAST_THRESHOLD,
    DEFAULT_HARRIS_K, DEFAULT_MAX_FEATURES, DEFAULT_MIN_CORRELATION, DEFAULT_MIN_OVERLAP,
    DEFAULT_PATCH_SIZE, DEFAULT_REFERENCE_CHANNEL, DEFAULT_SIGMA_CLIP, DEFAULT_UNITS,
};
use crate::error::{RegistrationError, Result};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegistrationConfig {
    /// Channel whose stack drives transform estimation.
    #[serde(default = "default_reference_channel")]
    pub reference_channel: String,
    /// Unit label written with every registered stack.
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default)]
    pub direct: DirectConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

fn default_reference_channel() -> String {
    DEFAULT_REFERENCE_CHANNEL.to_string()
}

fn default_units() -> String {
    DEFAULT_UNITS.to_string()
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            reference_channel: default_reference_channel(),
            units: default_units(),
            direct: DirectConfig::default(),
            features: FeatureConfig::default(),
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl RegistrationConfig {
    /// Reject parameter combinations the estimators cannot run with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.direct;
        if d.gauss_filter_size == 0 || d.gauss_filter_size % 2 == 0 {
            return Err(RegistrationError::Config(format!(
                "gauss_filter_size must be odd and > 0, got {}",
                d.gauss_filter_size
            )));
        }
        if d.max_iterations == 0 {
            return Err(RegistrationError::Config(
                "max_iterations must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&d.min_overlap) {
            return Err(RegistrationError::Config(format!(
                "min_overlap must be in [0, 1], got {}",
                d.min_overlap
            )));
        }
        if self.features.patch_size < 8 {
            return Err(RegistrationError::Config(format!(
                "patch_size must be >= 8, got {}",
                self.features.patch_size
            )));
        }
        if let IntensityBounds::Fixed { vmin, vmax } = self.preprocess.bounds {
            if vmax <= vmin {
                return Err(RegistrationError::Config(format!(
                    "fixed bounds need vmax > vmin, got [{vmin}, {vmax}]"
                )));
            }
        }
        if self.preprocess.sigma_clip <= 0.0 {
            return Err(RegistrationError::Config(
                "sigma_clip must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Motion model the direct estimator optimizes over.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MotionModel {
    /// Translation only (2 parameters).
    Translation,
    /// Rotation and translation (3 parameters).
    #[default]
    Euclidean,
    /// Full affine (6 parameters).
    Affine,
}

impl MotionModel {
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Translation => 2,
            Self::Euclidean => 3,
            Self::Affine => 6,
        }
    }
}

impl std::fmt::Display for MotionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Translation => write!(f, "Translation"),
            Self::Euclidean => write!(f, "Euclidean"),
            Self::Affine => write!(f, "Affine"),
        }
    }
}

/// Parameters for the intensity-correlation (ECC) estimator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectConfig {
    pub motion: MotionModel,
    pub max_iterations: usize,
    /// Stop once the correlation changes by less than this between iterations.
    pub epsilon: f64,
    /// Odd Gaussian kernel size applied to both frames before optimizing.
    pub gauss_filter_size: usize,
    /// Final correlation below this is reported as non-convergence.
    pub min_correlation: f64,
    /// Minimum fraction of the frame that must remain overlapped.
    pub min_overlap: f64,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            motion: MotionModel::default(),
            max_iterations: DEFAULT_ECC_MAX_ITERATIONS,
            epsilon: DEFAULT_ECC_EPSILON,
            gauss_filter_size: DEFAULT_ECC_GAUSS_SIZE,
            min_correlation: DEFAULT_MIN_CORRELATION,
            min_overlap: DEFAULT_MIN_OVERLAP,
        }
    }
}

/// Parameters for the keypoint-matching estimator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    /// Keypoint budget per frame.
    pub max_features: usize,
    /// FAST segment-test threshold in 8-bit levels.
    pub fast_threshold: u8,
    /// Side of the square patch used for orientation and descriptors.
    pub patch_size: usize,
    /// Harris detector constant used to rank corners.
    pub harris_k: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: DEFAULT_MAX_FEATURES,
            fast_threshold: DEFAULT_FAST_THRESHOLD,
            patch_size: DEFAULT_PATCH_SIZE,
            harris_k: DEFAULT_HARRIS_K,
        }
    }
}

/// How 8-bit quantization bounds are chosen for feature detection.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum IntensityBounds {
    /// Each frame gets its own mean +/- sigma_clip * std window.
    #[default]
    PerPair,
    /// One window computed from the whole stack and reused for every pair.
    PerStack,
    /// Fixed window for all frames.
    Fixed { vmin: f32, vmax: f32 },
}

impl std::fmt::Display for IntensityBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerPair => write!(f, "Per pair"),
            Self::PerStack => write!(f, "Per stack"),
            Self::Fixed { vmin, vmax } => write!(f, "Fixed [{vmin}, {vmax}]"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Clip width in standard deviations around the mean.
    pub sigma_clip: f32,
    pub bounds: IntensityBounds,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            sigma_clip: DEFAULT_SIGMA_CLIP,
            bounds: IntensityBounds::default(),
        }
    }
}
