//! Oriented BRIEF descriptors.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::consts::{BRIEF_PATTERN_SEED, DESCRIPTOR_BYTES};
use crate::filters::gaussian_blur_array;

use super::{Feature, Keypoint};

/// Smoothing applied before the binary intensity tests.
const DESCRIPTOR_BLUR_SIZE: usize = 5;

/// One binary test: compare the smoothed intensity at two offsets.
#[derive(Clone, Copy, Debug)]
struct PointPair {
    a: (f32, f32),
    b: (f32, f32),
}

/// Fixed sampling pattern of `DESCRIPTOR_BYTES * 8` point pairs inside a
/// disc of `radius` pixels. The same seed always yields the same pattern,
/// so descriptors from different frames are comparable.
fn sampling_pattern(radius: f32) -> Vec<PointPair> {
    let mut rng = StdRng::seed_from_u64(BRIEF_PATTERN_SEED);
    let point = |rng: &mut StdRng| loop {
        let x: f32 = rng.gen_range(-radius..=radius);
        let y: f32 = rng.gen_range(-radius..=radius);
        if x * x + y * y <= radius * radius {
            return (x, y);
        }
    };
    (0..DESCRIPTOR_BYTES * 8)
        .map(|_| PointPair {
            a: point(&mut rng),
            b: point(&mut rng),
        })
        .collect()
}

/// Keypoint orientation from the intensity centroid of a disc around it.
fn orientation(image: &Array2<f32>, kp: &Keypoint, radius: isize) -> f32 {
    let (cx, cy) = (kp.x as isize, kp.y as isize);
    let (h, w) = image.dim();
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (px, py) = (cx + dx, cy + dy);
            if px < 0 || py < 0 || px >= w as isize || py >= h as isize {
                continue;
            }
            let v = image[[py as usize, px as usize]];
            m10 += dx as f32 * v;
            m01 += dy as f32 * v;
        }
    }
    m01.atan2(m10)
}

/// Compute an orientation and a 256-bit descriptor for every keypoint.
pub fn describe(image: &Array2<u8>, keypoints: &[Keypoint], patch_size: usize) -> Vec<Feature> {
    let (h, w) = image.dim();
    let smoothed = gaussian_blur_array(&image.mapv(f32::from), DESCRIPTOR_BLUR_SIZE);
    let half = (patch_size / 2) as isize;
    let pattern = sampling_pattern((half - 1).max(1) as f32);

    let sample = |x: f32, y: f32| -> f32 {
        let col = (x.round() as isize).clamp(0, w as isize - 1) as usize;
        let row = (y.round() as isize).clamp(0, h as isize - 1) as usize;
        smoothed[[row, col]]
    };

    keypoints
        .iter()
        .map(|kp| {
            let angle = orientation(&smoothed, kp, half);
            let (sin, cos) = angle.sin_cos();
            let rotate = |(px, py): (f32, f32)| {
                (kp.x + px * cos - py * sin, kp.y + px * sin + py * cos)
            };

            let mut descriptor = [0u8; DESCRIPTOR_BYTES];
            for (i, pair) in pattern.iter().enumerate() {
                let (ax, ay) = rotate(pair.a);
                let (bx, by) = rotate(pair.b);
                if sample(ax, ay) < sample(bx, by) {
                    descriptor[i / 8] |= 1 << (i % 8);
                }
            }

            Feature {
                keypoint: Keypoint { angle, ..*kp },
                descriptor,
            }
        })
        .collect()
}

pub fn hamming_distance(a: &[u8; DESCRIPTOR_BYTES], b: &[u8; DESCRIPTOR_BYTES]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}
