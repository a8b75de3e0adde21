//! Direct alignment by Enhanced Correlation Coefficient maximization.
//!
//! The template is the previous frame and the input is the current one. The
//! warp maps template coordinates into the input frame, and each iteration
//! solves the linearized ECC problem for an additive parameter update.

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use tracing::debug;

use crate::consts::EPSILON;
use crate::error::{RegistrationError, Result};
use crate::filters::{central_gradients, gaussian_blur_array};
use crate::pipeline::config::{DirectConfig, MotionModel};
use crate::transform::AffineTransform;
use crate::warp::bilinear_sample_nan;

/// Outcome of a successful direct alignment.
#[derive(Clone, Copy, Debug)]
pub struct DirectAlignment {
    /// Maps previous-frame coordinates into current-frame coordinates.
    pub transform: AffineTransform,
    /// Correlation coefficient at the last evaluated warp.
    pub correlation: f64,
    pub iterations: usize,
}

#[derive(Clone, Debug, Default)]
pub struct DirectEstimator {
    pub config: DirectConfig,
}

/// Warp parameters of the active motion model.
#[derive(Clone, Copy, Debug)]
struct WarpState {
    rows: [[f64; 3]; 2],
    theta: f64,
}

impl WarpState {
    /// Project an arbitrary affine guess onto `motion`.
    fn project(motion: MotionModel, init: &AffineTransform) -> Self {
        let r = init.rows();
        match motion {
            MotionModel::Translation => Self {
                rows: [[1.0, 0.0, r[0][2]], [0.0, 1.0, r[1][2]]],
                theta: 0.0,
            },
            MotionModel::Euclidean => {
                let theta = r[1][0].clamp(-1.0, 1.0).asin();
                Self {
                    rows: *AffineTransform::euclidean(theta, r[0][2], r[1][2]).rows(),
                    theta,
                }
            }
            MotionModel::Affine => Self {
                rows: *r,
                theta: 0.0,
            },
        }
    }

    fn transform(&self) -> AffineTransform {
        AffineTransform::from_rows(self.rows)
    }

    /// Partial derivatives of the warped intensity with respect to each
    /// parameter at template point `(x, y)`.
    fn jacobian(&self, motion: MotionModel, x: f64, y: f64, gx: f64, gy: f64, out: &mut Vec<f64>) {
        match motion {
            MotionModel::Translation => out.extend_from_slice(&[gx, gy]),
            MotionModel::Euclidean => {
                let (s, c) = self.theta.sin_cos();
                let hat_x = -x * s - y * c;
                let hat_y = x * c - y * s;
                out.extend_from_slice(&[gx * hat_x + gy * hat_y, gx, gy]);
            }
            MotionModel::Affine => out.extend_from_slice(&[gx * x, gy * x, gx * y, gy * y, gx, gy]),
        }
    }

    fn update(&mut self, motion: MotionModel, delta: &DVector<f64>) {
        match motion {
            MotionModel::Translation => {
                self.rows[0][2] += delta[0];
                self.rows[1][2] += delta[1];
            }
            MotionModel::Euclidean => {
                self.theta += delta[0];
                let tx = self.rows[0][2] + delta[1];
                let ty = self.rows[1][2] + delta[2];
                self.rows = *AffineTransform::euclidean(self.theta, tx, ty).rows();
            }
            MotionModel::Affine => {
                self.rows[0][0] += delta[0];
                self.rows[1][0] += delta[1];
                self.rows[0][1] += delta[2];
                self.rows[1][1] += delta[3];
                self.rows[0][2] += delta[4];
                self.rows[1][2] += delta[5];
            }
        }
    }
}

fn not_converged(reason: impl Into<String>) -> RegistrationError {
    RegistrationError::ConvergenceFailure(reason.into())
}

impl DirectEstimator {
    pub fn new(config: DirectConfig) -> Self {
        Self { config }
    }

    /// Refine `init` so that `curr(transform(p))` best correlates with
    /// `prev(p)`.
    pub fn estimate(
        &self,
        prev: &Array2<f32>,
        curr: &Array2<f32>,
        init: &AffineTransform,
    ) -> Result<DirectAlignment> {
        if prev.dim() != curr.dim() {
            return Err(RegistrationError::ShapeMismatch {
                expected: prev.dim(),
                found: curr.dim(),
            });
        }
        if prev.iter().chain(curr.iter()).any(|v| v.is_nan()) {
            return Err(RegistrationError::InvalidInput(
                "direct alignment requires frames without missing values".into(),
            ));
        }
        if !init.is_finite() {
            return Err(RegistrationError::InvalidInput(
                "initial transform is not finite".into(),
            ));
        }

        let cfg = &self.config;
        let motion = cfg.motion;
        let (h, w) = prev.dim();
        let template = gaussian_blur_array(prev, cfg.gauss_filter_size);
        let input = gaussian_blur_array(curr, cfg.gauss_filter_size);
        let (grad_x, grad_y) = central_gradients(&input);

        let mut state = WarpState::project(motion, init);
        let mut rho = -1.0f64;
        let mut last_rho = f64::NEG_INFINITY;
        let mut iterations = 0usize;

        let n_params = motion.parameter_count();
        let mut t_vals: Vec<f64> = Vec::with_capacity(h * w);
        let mut i_vals: Vec<f64> = Vec::with_capacity(h * w);
        let mut jac: Vec<f64> = Vec::with_capacity(h * w * n_params);

        while iterations < cfg.max_iterations && (rho - last_rho).abs() >= cfg.epsilon {
            last_rho = rho;
            iterations += 1;

            t_vals.clear();
            i_vals.clear();
            jac.clear();
            let warp = state.transform();
            for row in 0..h {
                for col in 0..w {
                    let (x, y) = (col as f64, row as f64);
                    let (sx, sy) = warp.apply(x, y);
                    let v = bilinear_sample_nan(&input, sx, sy);
                    if !v.is_finite() {
                        continue;
                    }
                    let gx = bilinear_sample_nan(&grad_x, sx, sy) as f64;
                    let gy = bilinear_sample_nan(&grad_y, sx, sy) as f64;
                    t_vals.push(template[[row, col]] as f64);
                    i_vals.push(v as f64);
                    state.jacobian(motion, x, y, gx, gy, &mut jac);
                }
            }

            let n = t_vals.len();
            let overlap = n as f64 / (h * w) as f64;
            if n <= n_params || overlap < cfg.min_overlap {
                return Err(not_converged(format!(
                    "overlap {:.1}% below minimum {:.1}%",
                    overlap * 100.0,
                    cfg.min_overlap * 100.0
                )));
            }

            let t_mean = t_vals.iter().sum::<f64>() / n as f64;
            let i_mean = i_vals.iter().sum::<f64>() / n as f64;
            let t_zm = DVector::from_iterator(n, t_vals.iter().map(|v| v - t_mean));
            let i_zm = DVector::from_iterator(n, i_vals.iter().map(|v| v - i_mean));
            let j = DMatrix::from_row_slice(n, n_params, &jac);

            let t_norm = t_zm.norm();
            let i_norm = i_zm.norm();
            if t_norm * i_norm < EPSILON {
                return Err(not_converged("frame has no intensity variation"));
            }
            let correlation = t_zm.dot(&i_zm);
            rho = correlation / (t_norm * i_norm);
            if !rho.is_finite() {
                return Err(not_converged("correlation is not finite"));
            }

            let hessian = j.tr_mul(&j);
            let hessian_inv = hessian
                .try_inverse()
                .ok_or_else(|| not_converged("singular Hessian"))?;
            let i_proj = j.tr_mul(&i_zm);
            let t_proj = j.tr_mul(&t_zm);
            let i_proj_hess = &hessian_inv * &i_proj;

            let lambda_n = i_norm * i_norm - i_proj.dot(&i_proj_hess);
            let lambda_d = correlation - t_proj.dot(&i_proj_hess);
            if lambda_d <= 0.0 {
                return Err(not_converged(format!(
                    "correlation would decrease at iteration {iterations} (rho {rho:.4})"
                )));
            }
            let lambda = lambda_n / lambda_d;

            let error = &t_zm * lambda - &i_zm;
            let delta = &hessian_inv * j.tr_mul(&error);
            if delta.iter().any(|v| !v.is_finite()) {
                return Err(not_converged("parameter update is not finite"));
            }
            state.update(motion, &delta);
        }

        if rho < cfg.min_correlation {
            return Err(not_converged(format!(
                "final correlation {rho:.4} below {:.4}",
                cfg.min_correlation
            )));
        }

        let transform = state.transform();
        if !transform.is_finite() {
            return Err(not_converged("warp is not finite"));
        }
        debug!(rho, iterations, motion = %motion, "Direct alignment converged");

        Ok(DirectAlignment {
            transform,
            correlation: rho,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_projection_keeps_translation() {
        let init = AffineTransform::from_rows([[1.1, 0.0, 4.0], [0.0, 0.9, -2.0]]);
        let state = WarpState::project(MotionModel::Euclidean, &init);
        assert_eq!(state.theta, 0.0);
        assert_eq!(state.rows, [[1.0, 0.0, 4.0], [0.0, 1.0, -2.0]]);
    }

    #[test]
    fn test_translation_projection_drops_linear_part() {
        let init = AffineTransform::euclidean(0.3, 1.5, 2.5);
        let state = WarpState::project(MotionModel::Translation, &init);
        assert_eq!(state.rows, [[1.0, 0.0, 1.5], [0.0, 1.0, 2.5]]);
    }

    #[test]
    fn test_euclidean_update_rebuilds_rotation() {
        let mut state = WarpState::project(MotionModel::Euclidean, &AffineTransform::identity());
        state.update(MotionModel::Euclidean, &DVector::from_vec(vec![0.1, 1.0, 2.0]));
        let t = state.transform();
        assert!((t.rotation() - 0.1).abs() < 1e-12);
        assert_eq!(t.translation_part(), (1.0, 2.0));
    }
}
