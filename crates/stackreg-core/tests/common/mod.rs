use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stackreg_core::frame::{Frame, Stack};

/// Smooth random texture: a sum of Gaussian blobs over a dim background.
pub fn blob_canvas(h: usize, w: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut canvas = Array2::<f32>::from_elem((h, w), 0.1);
    let blobs = (h * w / 150).max(20);
    for _ in 0..blobs {
        let cx: f32 = rng.gen_range(0.0..w as f32);
        let cy: f32 = rng.gen_range(0.0..h as f32);
        let sigma: f32 = rng.gen_range(4.0..9.0);
        let amp: f32 = rng.gen_range(0.2..1.0);
        let reach = (3.0 * sigma).ceil() as isize;
        let s2 = 2.0 * sigma * sigma;
        for r in (cy as isize - reach).max(0)..(cy as isize + reach).min(h as isize) {
            for c in (cx as isize - reach).max(0)..(cx as isize + reach).min(w as isize) {
                let dx = c as f32 - cx;
                let dy = r as f32 - cy;
                canvas[[r as usize, c as usize]] += amp * (-(dx * dx + dy * dy) / s2).exp();
            }
        }
    }
    canvas
}

/// Corner-rich texture: overlapping flat rectangles, values in [0, 1].
pub fn rect_canvas(h: usize, w: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut canvas = Array2::<f32>::zeros((h, w));
    let rects = (h * w / 350).max(20);
    for _ in 0..rects {
        let rw = rng.gen_range(8..30usize);
        let rh = rng.gen_range(8..30usize);
        let x0 = rng.gen_range(0..w.saturating_sub(rw).max(1));
        let y0 = rng.gen_range(0..h.saturating_sub(rh).max(1));
        let v: f32 = rng.gen_range(0.1..1.0);
        for r in y0..(y0 + rh).min(h) {
            for c in x0..(x0 + rw).min(w) {
                canvas[[r, c]] = v;
            }
        }
    }
    canvas
}

/// Uniform noise in [0, 1).
pub fn noise(h: usize, w: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((h, w), |_| rng.gen_range(0.0..1.0))
}

/// An `h x w` window of `canvas` such that `window(p) = base(p - (dx, dy))`,
/// where `base` is the unshifted window starting at `(margin, margin)`.
pub fn shifted_window(
    canvas: &Array2<f32>,
    margin: usize,
    h: usize,
    w: usize,
    dx: isize,
    dy: isize,
) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| {
        let sr = (margin + r) as isize - dy;
        let sc = (margin + c) as isize - dx;
        canvas[[sr as usize, sc as usize]]
    })
}

/// Stack of frames that drift by the given cumulative offsets.
pub fn drifting_stack(
    canvas: &Array2<f32>,
    margin: usize,
    h: usize,
    w: usize,
    offsets: &[(isize, isize)],
) -> Stack {
    let frames = offsets
        .iter()
        .map(|&(dx, dy)| shifted_window(canvas, margin, h, w, dx, dy))
        .collect();
    stack_of(frames)
}

pub fn stack_of(frames: Vec<Array2<f32>>) -> Stack {
    Stack::new(
        frames
            .into_iter()
            .enumerate()
            .map(|(i, data)| Frame::new(data, i))
            .collect(),
    )
    .unwrap()
}

/// Overwrite a border of the given widths with NaN.
pub fn with_nan_border(
    mut data: Array2<f32>,
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
) -> Array2<f32> {
    let (h, w) = data.dim();
    for r in 0..h {
        for c in 0..w {
            if r < top || r >= h - bottom || c < left || c >= w - right {
                data[[r, c]] = f32::NAN;
            }
        }
    }
    data
}

/// Largest absolute difference over the finite samples shared by both.
pub fn max_abs_diff(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}
