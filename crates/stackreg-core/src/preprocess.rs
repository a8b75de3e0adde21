//! 8-bit quantization of intensity maps for keypoint detection.
//!
//! The quantized copy is only ever fed to the feature estimator. Direct
//! alignment and resampling always work on the original `f32` data.

use ndarray::Array2;
use num_traits::Float;

use crate::consts::U8_MAX_LEVEL;
use crate::frame::Stack;

/// Mean and population standard deviation over the finite samples.
///
/// Returns `None` when there are no finite samples.
pub fn finite_mean_std<T: Float>(values: impl IntoIterator<Item = T>) -> Option<(f64, f64)> {
    let mut n = 0usize;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for v in values {
        if let Some(v) = v.to_f64().filter(|v| v.is_finite()) {
            n += 1;
            sum += v;
            sum_sq += v * v;
        }
    }
    if n == 0 {
        return None;
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    Some((mean, var.sqrt()))
}

/// `[mean - sigma_clip * std, mean + sigma_clip * std]` of one frame.
pub fn sigma_bounds(data: &Array2<f32>, sigma_clip: f32) -> Option<(f32, f32)> {
    let (mean, std) = finite_mean_std(data.iter().copied())?;
    let half = sigma_clip as f64 * std;
    Some(((mean - half) as f32, (mean + half) as f32))
}

/// The sigma window computed over every frame of a stack at once.
pub fn stack_bounds(stack: &Stack, sigma_clip: f32) -> Option<(f32, f32)> {
    let (mean, std) = finite_mean_std(stack.iter().flat_map(|f| f.data.iter().copied()))?;
    let half = sigma_clip as f64 * std;
    Some(((mean - half) as f32, (mean + half) as f32))
}

/// Quantize a frame to 8 bits.
///
/// With explicit `bounds = (vmin, vmax)`, values are clipped to the window
/// and shifted so `vmin` maps to 0. Without bounds the frame is clipped to
/// its own sigma window and shifted so its minimum maps to 0. Either way the
/// maximum is then scaled to 255 with round-to-nearest. Missing samples map
/// to 0, and a flat frame maps to all zeros.
pub fn to_u8(data: &Array2<f32>, bounds: Option<(f32, f32)>, sigma_clip: f32) -> Array2<u8> {
    let shifted = match bounds {
        Some((a, b)) => {
            let (vmin, vmax) = if a <= b { (a, b) } else { (b, a) };
            data.mapv(|v| v.clamp(vmin, vmax) - vmin)
        }
        None => {
            let Some((lo, hi)) = sigma_bounds(data, sigma_clip) else {
                return Array2::zeros(data.dim());
            };
            let clipped = data.mapv(|v| v.clamp(lo, hi));
            let min = clipped
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(f32::INFINITY, f32::min);
            clipped.mapv(|v| v - min)
        }
    };

    let max = shifted
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Array2::zeros(data.dim());
    }

    shifted.mapv(|v| {
        if v.is_finite() {
            (U8_MAX_LEVEL * v / max).round().clamp(0.0, U8_MAX_LEVEL) as u8
        } else {
            0
        }
    })
}
