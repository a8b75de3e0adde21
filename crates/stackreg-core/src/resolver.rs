//! Pairwise transform resolution with a direct-then-feature fallback.
//!
//! Each consecutive frame pair walks a small state machine:
//!
//! ```text
//! AttemptDirect ──ok──────────────────────────────────────────▶ Done
//!      │ recoverable failure
//!      ▼
//! AttemptFeatureInit ──ok──▶ AttemptDirectWithInit ──ok───────▶ Done
//!      │ failure                   │ failure
//!      └──────────────▶ Abort ◀────┘
//! ```
//!
//! `Abort` ends registration of the whole stack with
//! [`RegistrationError::UnregistrablePair`]. Pairs are resolved strictly in
//! frame order and the resulting chain entries are never revised.

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::direct::DirectEstimator;
use crate::error::{RegistrationError, Result};
use crate::features::FeatureEstimator;
use crate::frame::Stack;
use crate::pipeline::config::{IntensityBounds, RegistrationConfig};
use crate::pipeline::types::{NoOpReporter, ProgressReporter, RegistrationStage};
use crate::preprocess::stack_bounds;
use crate::transform::{AffineTransform, TransformChain};

/// Refines an initial guess into a transform mapping `prev` coordinates into
/// `curr` coordinates.
pub trait DirectAligner {
    fn align(
        &self,
        prev: &Array2<f32>,
        curr: &Array2<f32>,
        init: &AffineTransform,
    ) -> Result<AffineTransform>;
}

/// Produces a rough `prev` → `curr` transform without an initial guess.
pub trait CoarseAligner {
    fn coarse(&self, prev: &Array2<f32>, curr: &Array2<f32>) -> Result<AffineTransform>;
}

impl DirectAligner for DirectEstimator {
    fn align(
        &self,
        prev: &Array2<f32>,
        curr: &Array2<f32>,
        init: &AffineTransform,
    ) -> Result<AffineTransform> {
        self.estimate(prev, curr, init).map(|a| a.transform)
    }
}

impl CoarseAligner for FeatureEstimator {
    fn coarse(&self, prev: &Array2<f32>, curr: &Array2<f32>) -> Result<AffineTransform> {
        self.estimate(prev, curr)
    }
}

/// Which route produced a pair's transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairPath {
    /// Direct alignment from the identity succeeded.
    Direct,
    /// Direct alignment succeeded only when seeded by the feature estimate.
    FeatureSeeded,
}

impl std::fmt::Display for PairPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::FeatureSeeded => write!(f, "feature-seeded"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PairResolution {
    pub transform: AffineTransform,
    pub path: PairPath,
}

/// A transform chain together with the route taken for every pair.
/// `paths[i]` belongs to the pair `(i, i + 1)`.
#[derive(Clone, Debug)]
pub struct ResolvedChain {
    pub chain: TransformChain,
    pub paths: Vec<PairPath>,
}

impl ResolvedChain {
    pub fn fallback_count(&self) -> usize {
        self.paths
            .iter()
            .filter(|p| **p == PairPath::FeatureSeeded)
            .count()
    }
}

enum PairState {
    AttemptDirect,
    AttemptFeatureInit {
        direct_err: RegistrationError,
    },
    AttemptDirectWithInit {
        init: AffineTransform,
        direct_err: RegistrationError,
    },
    Done(PairResolution),
    Abort {
        direct_err: RegistrationError,
        fallback_err: RegistrationError,
    },
}

pub struct Resolver<D, C> {
    direct: D,
    coarse: C,
}

impl<D: DirectAligner, C: CoarseAligner> Resolver<D, C> {
    pub fn new(direct: D, coarse: C) -> Self {
        Self { direct, coarse }
    }

    pub fn direct(&self) -> &D {
        &self.direct
    }

    pub fn coarse(&self) -> &C {
        &self.coarse
    }

    /// Resolve one pair. Non-recoverable errors (I/O, shape) pass straight
    /// through; estimator failures drive the fallback.
    pub fn resolve_pair(
        &self,
        prev: &Array2<f32>,
        curr: &Array2<f32>,
        prev_idx: usize,
        curr_idx: usize,
    ) -> Result<PairResolution> {
        let mut state = PairState::AttemptDirect;
        loop {
            state = match state {
                PairState::AttemptDirect => {
                    match self.direct.align(prev, curr, &AffineTransform::identity()) {
                        Ok(transform) => PairState::Done(PairResolution {
                            transform,
                            path: PairPath::Direct,
                        }),
                        Err(e) if e.is_recoverable() => {
                            debug!(prev = prev_idx, curr = curr_idx, error = %e, "Direct alignment failed, trying features");
                            PairState::AttemptFeatureInit { direct_err: e }
                        }
                        Err(e) => return Err(e),
                    }
                }
                PairState::AttemptFeatureInit { direct_err } => {
                    match self.coarse.coarse(prev, curr) {
                        Ok(init) => {
                            debug!(prev = prev_idx, curr = curr_idx, "Feature estimate found, reseeding direct alignment");
                            PairState::AttemptDirectWithInit { init, direct_err }
                        }
                        Err(e) if e.is_recoverable() => PairState::Abort {
                            direct_err,
                            fallback_err: e,
                        },
                        Err(e) => return Err(e),
                    }
                }
                PairState::AttemptDirectWithInit { init, direct_err } => {
                    match self.direct.align(prev, curr, &init) {
                        Ok(transform) => PairState::Done(PairResolution {
                            transform,
                            path: PairPath::FeatureSeeded,
                        }),
                        Err(e) if e.is_recoverable() => PairState::Abort {
                            direct_err,
                            fallback_err: e,
                        },
                        Err(e) => return Err(e),
                    }
                }
                PairState::Done(resolution) => return Ok(resolution),
                PairState::Abort {
                    direct_err,
                    fallback_err,
                } => {
                    warn!(prev = prev_idx, curr = curr_idx, "Frame pair could not be registered");
                    return Err(RegistrationError::UnregistrablePair {
                        prev: prev_idx,
                        curr: curr_idx,
                        direct: Box::new(direct_err),
                        fallback: Box::new(fallback_err),
                    });
                }
            };
        }
    }

    /// Resolve every consecutive pair of `stack` in order, recording the
    /// route taken for each.
    pub fn resolve_stack(
        &self,
        stack: &Stack,
        reporter: &dyn ProgressReporter,
    ) -> Result<ResolvedChain> {
        let mut chain = TransformChain::new();
        let mut paths = Vec::with_capacity(stack.len().saturating_sub(1));
        if stack.len() < 2 {
            return Ok(ResolvedChain { chain, paths });
        }

        reporter.begin_stage(RegistrationStage::Estimating, Some(stack.len() - 1));
        for (i, pair) in stack.frames().windows(2).enumerate() {
            let (prev, curr) = (&pair[0], &pair[1]);
            let resolution = self.resolve_pair(&prev.data, &curr.data, i, i + 1)?;
            let (tx, ty) = resolution.transform.translation_part();
            debug!(prev = i, curr = i + 1, path = %resolution.path, tx, ty, "Pair resolved");
            chain.push(resolution.transform);
            paths.push(resolution.path);
            reporter.advance(i + 1);
        }
        reporter.finish_stage();

        let resolved = ResolvedChain { chain, paths };
        info!(
            pairs = resolved.paths.len(),
            fallbacks = resolved.fallback_count(),
            "Transform chain complete"
        );
        Ok(resolved)
    }

    /// One transform per frame, entry 0 the identity.
    pub fn find_transforms(
        &self,
        stack: &Stack,
        reporter: &dyn ProgressReporter,
    ) -> Result<TransformChain> {
        Ok(self.resolve_stack(stack, reporter)?.chain)
    }
}

impl Resolver<DirectEstimator, FeatureEstimator> {
    /// Production estimators configured for `stack`. Per-stack intensity
    /// bounds are computed here, once.
    pub fn from_config(config: &RegistrationConfig, stack: &Stack) -> Self {
        let sigma_clip = config.preprocess.sigma_clip;
        let bounds = match config.preprocess.bounds {
            IntensityBounds::PerPair => None,
            IntensityBounds::PerStack => stack_bounds(stack, sigma_clip),
            IntensityBounds::Fixed { vmin, vmax } => Some((vmin, vmax)),
        };
        debug!(bounds = ?bounds, mode = %config.preprocess.bounds, "Feature quantization bounds");
        Self::new(
            DirectEstimator::new(config.direct.clone()),
            FeatureEstimator::new(config.features.clone(), sigma_clip, bounds),
        )
    }
}

/// Transform chain for `stack` with the production estimators.
pub fn find_transforms(stack: &Stack, config: &RegistrationConfig) -> Result<TransformChain> {
    Resolver::from_config(config, stack).find_transforms(stack, &NoOpReporter)
}
