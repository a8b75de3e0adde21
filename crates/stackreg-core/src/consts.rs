/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-10;

/// Number of point correspondences needed for an exact affine solve.
pub const AFFINE_POINT_COUNT: usize = 3;

/// Quantization ceiling for feature-detection images (8-bit).
pub const U8_MAX_LEVEL: f32 = 255.0;

/// Default reference channel used to drive transform estimation.
pub const DEFAULT_REFERENCE_CHANNEL: &str = "Mn_Ka";

/// Default unit label written alongside registered stacks.
pub const DEFAULT_UNITS: &str = "a.u.";

/// Default clip width, in standard deviations, for 8-bit quantization.
pub const DEFAULT_SIGMA_CLIP: f32 = 2.0;

/// Default keypoint budget per frame for the feature estimator.
pub const DEFAULT_MAX_FEATURES: usize = 1000;

/// Default FAST intensity threshold (8-bit levels).
pub const DEFAULT_FAST_THRESHOLD: u8 = 20;

/// Default descriptor patch size in pixels.
pub const DEFAULT_PATCH_SIZE: usize = 50;

/// Harris detector free parameter used to rank FAST corners.
pub const DEFAULT_HARRIS_K: f32 = 0.04;

/// Number of binary tests in a BRIEF descriptor (256 bits = 32 bytes).
pub const DESCRIPTOR_BYTES: usize = 32;

/// Seed for the fixed BRIEF sampling pattern.
pub const BRIEF_PATTERN_SEED: u64 = 0x5EED_B41E;

/// Minimum contiguous arc length on the 16-pixel circle for a FAST corner.
pub const FAST_ARC_LENGTH: usize = 9;

/// Minimum triangle area (px^2) for three correspondences to be usable.
pub const MIN_TRIANGLE_AREA: f64 = 1.0;

/// Default iteration cap for the direct (ECC) estimator.
pub const DEFAULT_ECC_MAX_ITERATIONS: usize = 50;

/// Default correlation-change threshold that stops the ECC iterations.
pub const DEFAULT_ECC_EPSILON: f64 = 1e-3;

/// Default Gaussian pre-smoothing kernel size for ECC (odd).
pub const DEFAULT_ECC_GAUSS_SIZE: usize = 5;

/// Default minimum correlation accepted as a converged ECC result.
pub const DEFAULT_MIN_CORRELATION: f64 = 0.5;

/// Default minimum fraction of template pixels that must stay inside the
/// warped input during ECC.
pub const DEFAULT_MIN_OVERLAP: f64 = 0.25;

/// Size of the `.stk` file header in bytes.
pub const STACK_HEADER_SIZE: usize = 128;

/// Magic bytes at the start of every `.stk` file.
pub const STACK_MAGIC: &[u8; 8] = b"STACKREG";

/// Current `.stk` format version.
pub const STACK_FORMAT_VERSION: u32 = 1;

/// Width of each fixed string field in the `.stk` header.
pub const STACK_STRING_FIELD: usize = 32;
