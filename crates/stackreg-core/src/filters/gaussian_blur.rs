use ndarray::Array2;

/// Smooth an array with a separable Gaussian of odd size `ksize`.
///
/// Sigma follows the usual size-derived rule
/// `0.3 * ((ksize - 1) / 2 - 1) + 0.8`. Borders are clamped.
pub fn gaussian_blur_array(data: &Array2<f32>, ksize: usize) -> Array2<f32> {
    if ksize <= 1 {
        return data.clone();
    }
    let kernel = make_gaussian_kernel(ksize);
    let row_pass = convolve_rows(data, &kernel);
    convolve_cols(&row_pass, &kernel)
}

/// Sigma implied by a kernel size.
pub fn sigma_for_size(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn make_gaussian_kernel(ksize: usize) -> Vec<f32> {
    let sigma = sigma_for_size(ksize);
    let radius = ksize / 2;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..ksize)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

fn convolve_rows(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src_col = (col as isize + ki as isize - radius as isize)
                    .clamp(0, w as isize - 1) as usize;
                sum += data[[row, src_col]] * kv;
            }
            result[[row, col]] = sum;
        }
    }
    result
}

fn convolve_cols(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<f32>::zeros((h, w));
    for row in 0..h {
        for col in 0..w {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src_row = (row as isize + ki as isize - radius as isize)
                    .clamp(0, h as isize - 1) as usize;
                sum += data[[src_row, col]] * kv;
            }
            result[[row, col]] = sum;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_normalized() {
        let k = make_gaussian_kernel(5);
        assert_eq!(k.len(), 5);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(k[2] > k[1] && k[1] > k[0]);
    }

    #[test]
    fn test_blur_preserves_constant() {
        let data = Array2::<f32>::from_elem((8, 8), 3.0);
        let blurred = gaussian_blur_array(&data, 5);
        for &v in blurred.iter() {
            assert!((v - 3.0).abs() < 1e-5);
        }
    }
}
