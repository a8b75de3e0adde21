//! FAST-9 corner detection ranked by Harris response.

use std::cmp::Ordering;

use ndarray::Array2;

use crate::consts::FAST_ARC_LENGTH;
use crate::pipeline::config::FeatureConfig;

use super::Keypoint;

/// Bresenham circle of radius 3, clockwise from the top.
const CIRCLE: [(isize, isize); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Half-width of the Harris structure-tensor window (7x7).
const HARRIS_RADIUS: isize = 3;

/// Detect up to `config.max_features` corners at least half a patch away
/// from every border, strongest first.
pub fn detect(image: &Array2<u8>, config: &FeatureConfig) -> Vec<Keypoint> {
    let (h, w) = image.dim();
    let border = border_for(config.patch_size);
    if h <= 2 * border || w <= 2 * border {
        return Vec::new();
    }

    let mut response = Array2::<f32>::zeros((h, w));
    let mut candidates = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            if is_corner(image, x, y, config.fast_threshold) {
                let r = harris_response(image, x, y, config.harris_k);
                if r > 0.0 {
                    response[[y, x]] = r;
                    candidates.push((x, y));
                }
            }
        }
    }

    let mut keypoints: Vec<Keypoint> = candidates
        .into_iter()
        .filter(|&(x, y)| is_local_max(&response, x, y))
        .map(|(x, y)| Keypoint {
            x: x as f32,
            y: y as f32,
            response: response[[y, x]],
            angle: 0.0,
        })
        .collect();

    keypoints.sort_by(|a, b| {
        b.response
            .partial_cmp(&a.response)
            .unwrap_or(Ordering::Equal)
    });
    keypoints.truncate(config.max_features);
    keypoints
}

/// Pixels kept clear of the border so the whole descriptor patch fits.
pub(super) fn border_for(patch_size: usize) -> usize {
    (patch_size / 2 + 1).max(HARRIS_RADIUS as usize + 2)
}

fn pixel(image: &Array2<u8>, x: usize, y: usize, dx: isize, dy: isize) -> u8 {
    image[[(y as isize + dy) as usize, (x as isize + dx) as usize]]
}

/// Segment test: at least nine contiguous circle pixels all brighter than
/// `center + threshold` or all darker than `center - threshold`.
fn is_corner(image: &Array2<u8>, x: usize, y: usize, threshold: u8) -> bool {
    let center = image[[y, x]];
    let bright = center.saturating_add(threshold);
    let dark = center.saturating_sub(threshold);

    // Any arc of nine covers at least two of the four compass points.
    let compass = [0usize, 4, 8, 12].map(|i| {
        let (dx, dy) = CIRCLE[i];
        pixel(image, x, y, dx, dy)
    });
    let n_bright = compass.iter().filter(|&&p| p > bright).count();
    let n_dark = compass.iter().filter(|&&p| p < dark).count();
    if n_bright < 2 && n_dark < 2 {
        return false;
    }

    let mut run_bright = 0;
    let mut run_dark = 0;
    for i in 0..CIRCLE.len() * 2 {
        let (dx, dy) = CIRCLE[i % CIRCLE.len()];
        let p = pixel(image, x, y, dx, dy);
        if p > bright {
            run_bright += 1;
            run_dark = 0;
        } else if p < dark {
            run_dark += 1;
            run_bright = 0;
        } else {
            run_bright = 0;
            run_dark = 0;
        }
        if run_bright >= FAST_ARC_LENGTH || run_dark >= FAST_ARC_LENGTH {
            return true;
        }
    }
    false
}

/// Harris corner measure `det(M) - k * trace(M)^2` over a 7x7 window of
/// Sobel gradients.
fn harris_response(image: &Array2<u8>, x: usize, y: usize, k: f32) -> f32 {
    let mut a = 0.0f32;
    let mut b = 0.0f32;
    let mut c = 0.0f32;
    for dy in -HARRIS_RADIUS..=HARRIS_RADIUS {
        for dx in -HARRIS_RADIUS..=HARRIS_RADIUS {
            let px = (x as isize + dx) as usize;
            let py = (y as isize + dy) as usize;
            let p = |ox: isize, oy: isize| pixel(image, px, py, ox, oy) as f32;
            let ix = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let iy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            a += ix * ix;
            b += iy * iy;
            c += ix * iy;
        }
    }
    // Keep magnitudes comparable to 8-bit data.
    let norm = 1.0 / (4.0 * 255.0 * 49.0);
    let (a, b, c) = (a * norm, b * norm, c * norm);
    a * b - c * c - k * (a + b) * (a + b)
}

fn is_local_max(response: &Array2<f32>, x: usize, y: usize) -> bool {
    let r = response[[y, x]];
    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = (x as isize + dx) as usize;
            let ny = (y as isize + dy) as usize;
            let n = response[[ny, nx]];
            // Ties go to the earlier pixel in scan order.
            if n > r || (n == r && (dy < 0 || (dy == 0 && dx < 0))) {
                return false;
            }
        }
    }
    true
}
