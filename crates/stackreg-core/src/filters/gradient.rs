use ndarray::Array2;

/// Horizontal and vertical central-difference gradients `(gx, gy)`,
/// `0.5 * (I[x+1] - I[x-1])`, one-sided at the borders.
pub fn central_gradients(data: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
    let (h, w) = data.dim();
    let mut gx = Array2::<f32>::zeros((h, w));
    let mut gy = Array2::<f32>::zeros((h, w));

    for row in 0..h {
        let up = row.saturating_sub(1);
        let down = (row + 1).min(h - 1);
        for col in 0..w {
            let left = col.saturating_sub(1);
            let right = (col + 1).min(w - 1);
            gx[[row, col]] = 0.5 * (data[[row, right]] - data[[row, left]]);
            gy[[row, col]] = 0.5 * (data[[down, col]] - data[[up, col]]);
        }
    }

    (gx, gy)
}
