//! Affine transforms and the per-stack transform chain.
//!
//! An [`AffineTransform`] maps pixel coordinates `(x, y)` = `(col, row)` of
//! one frame into another frame's coordinate system. Within a
//! [`TransformChain`], entry `i` maps frame `i - 1` coordinates into frame
//! `i` coordinates; entry 0 is always the identity.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// A 2x3 affine matrix `[[a, b, tx], [c, d, ty]]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AffineTransform {
    rows: [[f64; 3]; 2],
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
    }

    pub fn from_rows(rows: [[f64; 3]; 2]) -> Self {
        Self { rows }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::from_rows([[1.0, 0.0, dx], [0.0, 1.0, dy]])
    }

    /// Rotation by `theta` radians followed by a translation.
    pub fn euclidean(theta: f64, dx: f64, dy: f64) -> Self {
        Self::similarity(1.0, theta, dx, dy)
    }

    /// Uniform scale and rotation followed by a translation.
    pub fn similarity(scale: f64, theta: f64, dx: f64, dy: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::from_rows([
            [scale * c, -scale * s, dx],
            [scale * s, scale * c, dy],
        ])
    }

    pub fn rows(&self) -> &[[f64; 3]; 2] {
        &self.rows
    }

    /// Append the `[0, 0, 1]` row.
    pub fn to_homogeneous(&self) -> Matrix3<f64> {
        let r = &self.rows;
        Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            0.0, 0.0, 1.0,
        )
    }

    /// Drop the last row of a homogeneous matrix.
    pub fn from_homogeneous(m: &Matrix3<f64>) -> Self {
        Self::from_rows([
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        ])
    }

    /// The transform that applies `self` first and `next` second.
    pub fn then(&self, next: &AffineTransform) -> AffineTransform {
        Self::from_homogeneous(&(next.to_homogeneous() * self.to_homogeneous()))
    }

    pub fn inverse(&self) -> Option<AffineTransform> {
        self.to_homogeneous()
            .try_inverse()
            .map(|m| Self::from_homogeneous(&m))
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let r = &self.rows;
        (
            r[0][0] * x + r[0][1] * y + r[0][2],
            r[1][0] * x + r[1][1] * y + r[1][2],
        )
    }

    /// Rotation angle of the linear part, in radians.
    pub fn rotation(&self) -> f64 {
        self.rows[1][0].atan2(self.rows[0][0])
    }

    /// Scale of the linear part's first column.
    pub fn scale(&self) -> f64 {
        self.rows[0][0].hypot(self.rows[1][0])
    }

    /// (tx, ty)
    pub fn translation_part(&self) -> (f64, f64) {
        (self.rows[0][2], self.rows[1][2])
    }

    pub fn is_finite(&self) -> bool {
        self.rows.iter().flatten().all(|v| v.is_finite())
    }

    pub fn is_identity(&self, tol: f64) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(Self::identity().rows.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// One pairwise transform per frame, entry 0 the identity.
///
/// Entries are appended once and never revised.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChainRepr", into = "ChainRepr")]
pub struct TransformChain {
    transforms: Vec<AffineTransform>,
}

#[derive(Serialize, Deserialize)]
struct ChainRepr {
    transforms: Vec<AffineTransform>,
}

impl TryFrom<ChainRepr> for TransformChain {
    type Error = RegistrationError;

    fn try_from(repr: ChainRepr) -> Result<Self> {
        Self::from_transforms(repr.transforms)
    }
}

impl From<TransformChain> for ChainRepr {
    fn from(chain: TransformChain) -> Self {
        Self {
            transforms: chain.transforms,
        }
    }
}

impl Default for TransformChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformChain {
    /// A chain for a single frame: just the identity.
    pub fn new() -> Self {
        Self {
            transforms: vec![AffineTransform::identity()],
        }
    }

    /// Rebuild a chain from stored transforms. The first entry must be the
    /// identity.
    pub fn from_transforms(transforms: Vec<AffineTransform>) -> Result<Self> {
        match transforms.first() {
            None => Err(RegistrationError::EmptySequence),
            Some(first) if !first.is_identity(1e-9) => Err(RegistrationError::InvalidInput(
                "first transform of a chain must be the identity".into(),
            )),
            Some(_) => Ok(Self { transforms }),
        }
    }

    /// Append the transform mapping the previous last frame into the next one.
    pub fn push(&mut self, transform: AffineTransform) {
        self.transforms.push(transform);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AffineTransform> {
        self.transforms.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AffineTransform> {
        self.transforms.iter()
    }

    pub fn as_slice(&self) -> &[AffineTransform] {
        &self.transforms
    }

    /// Per-frame transforms relative to frame 0. See [`crate::warp::compose`].
    pub fn composed(&self) -> Vec<AffineTransform> {
        crate::warp::compose(self)
    }
}
