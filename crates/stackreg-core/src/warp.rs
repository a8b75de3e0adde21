//! Composition of pairwise transforms and NaN-aware resampling.

use ndarray::Array2;
use tracing::debug;

use crate::crop::crop_nans;
use crate::error::{RegistrationError, Result};
use crate::frame::{Frame, Stack};
use crate::pipeline::types::{NoOpReporter, ProgressReporter, RegistrationStage};
use crate::transform::{AffineTransform, TransformChain};

/// Slack allowed when deciding whether a sample point lies inside the frame.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Per-frame transforms relative to frame 0.
///
/// Entry `i` is `T_i * T_{i-1} * ... * T_0` in homogeneous form: the most
/// recent pairwise transform is the left-most factor, so it is applied last
/// to a frame-0 point. The result maps frame-0 coordinates into frame `i`.
pub fn compose(chain: &TransformChain) -> Vec<AffineTransform> {
    chain
        .iter()
        .scan(AffineTransform::identity(), |acc, t| {
            *acc = acc.then(t);
            Some(*acc)
        })
        .collect()
}

/// Bilinear interpolation at `(x, y)` = `(col, row)`.
///
/// Returns NaN outside `[0, width - 1] x [0, height - 1]`. A NaN neighbour
/// with non-zero weight makes the result NaN.
pub fn bilinear_sample_nan(data: &Array2<f32>, x: f64, y: f64) -> f32 {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return f32::NAN;
    }
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;
    if !x.is_finite()
        || !y.is_finite()
        || x < -EDGE_TOLERANCE
        || y < -EDGE_TOLERANCE
        || x > max_x + EDGE_TOLERANCE
        || y > max_y + EDGE_TOLERANCE
    {
        return f32::NAN;
    }

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let taps = [
        (y0, x0, (1.0 - fx) * (1.0 - fy)),
        (y0, x1, fx * (1.0 - fy)),
        (y1, x0, (1.0 - fx) * fy),
        (y1, x1, fx * fy),
    ];
    let mut sum = 0.0f64;
    for (r, c, weight) in taps {
        if weight > 0.0 {
            sum += data[[r, c]] as f64 * weight;
        }
    }
    sum as f32
}

/// Resample a frame so that `out(p) = frame(transform(p))`.
pub fn warp_frame(frame: &Frame, transform: &AffineTransform) -> Frame {
    let (h, w) = frame.dim();
    let data = Array2::from_shape_fn((h, w), |(row, col)| {
        let (sx, sy) = transform.apply(col as f64, row as f64);
        bilinear_sample_nan(&frame.data, sx, sy)
    });
    Frame::new(data, frame.index)
}

/// Resample every frame with its composed transform. No cropping.
pub fn resample_stack(
    stack: &Stack,
    composed: &[AffineTransform],
    reporter: &dyn ProgressReporter,
) -> Result<Stack> {
    if composed.len() != stack.len() {
        return Err(RegistrationError::ChainLengthMismatch {
            transforms: composed.len(),
            frames: stack.len(),
        });
    }

    reporter.begin_stage(RegistrationStage::Resampling, Some(stack.len()));
    let mut frames = Vec::with_capacity(stack.len());
    for (i, (frame, transform)) in stack.iter().zip(composed).enumerate() {
        frames.push(warp_frame(frame, transform));
        reporter.advance(i + 1);
    }
    reporter.finish_stage();
    debug!(frames = frames.len(), "Resampled stack");

    Stack::new(frames)
}

/// Crop the missing-value border, then resample every frame under the
/// composition of `chain`.
///
/// Only valid for the stack `chain` was estimated on: the crop here is
/// derived from this stack's own border. Other channels must reuse the
/// reference crop through [`Registration::apply`].
///
/// [`Registration::apply`]: crate::pipeline::Registration::apply
pub fn apply_transforms(stack: &Stack, chain: &TransformChain) -> Result<Stack> {
    if chain.len() != stack.len() {
        return Err(RegistrationError::ChainLengthMismatch {
            transforms: chain.len(),
            frames: stack.len(),
        });
    }
    let cropped = crop_nans(stack)?;
    resample_stack(&cropped, &compose(chain), &NoOpReporter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_on_grid_is_exact() {
        let data = Array2::from_shape_fn((3, 4), |(r, c)| (r * 10 + c) as f32);
        assert_eq!(bilinear_sample_nan(&data, 2.0, 1.0), 12.0);
        assert_eq!(bilinear_sample_nan(&data, 3.0, 2.0), 23.0);
    }

    #[test]
    fn test_sample_midpoint() {
        let data = Array2::from_shape_fn((2, 2), |(r, c)| (r * 2 + c) as f32);
        assert!((bilinear_sample_nan(&data, 0.5, 0.5) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_outside_is_nan() {
        let data = Array2::<f32>::ones((4, 4));
        assert!(bilinear_sample_nan(&data, -0.5, 1.0).is_nan());
        assert!(bilinear_sample_nan(&data, 1.0, 3.5).is_nan());
    }

    #[test]
    fn test_zero_weight_nan_neighbour_ignored() {
        let mut data = Array2::<f32>::ones((3, 3));
        data[[1, 2]] = f32::NAN;
        assert_eq!(bilinear_sample_nan(&data, 1.0, 1.0), 1.0);
        assert!(bilinear_sample_nan(&data, 1.5, 1.0).is_nan());
    }
}
