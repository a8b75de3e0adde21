use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crop::{crop_nans_with_rect, crop_stack, CropRect};
use crate::direct::DirectEstimator;
use crate::error::{RegistrationError, Result};
use crate::features::FeatureEstimator;
use crate::frame::{Channel, ChannelSet, Stack};
use crate::resolver::{CoarseAligner, DirectAligner, PairPath, Resolver};
use crate::transform::{AffineTransform, TransformChain};
use crate::warp::resample_stack;

use super::config::RegistrationConfig;
use super::types::{NoOpReporter, ProgressReporter, RegistrationStage};

/// Everything needed to resample any channel recorded alongside the
/// reference stack, without estimating again.
#[derive(Clone, Debug)]
pub struct Registration {
    /// Rectangle the reference stack was cropped to, if it had missing borders.
    pub crop: Option<CropRect>,
    /// (height, width) of the uncropped reference frames.
    pub source_dim: (usize, usize),
    pub chain: TransformChain,
    /// `chain.composed()`, cached.
    pub composed: Vec<AffineTransform>,
    /// Route taken per pair; empty when rebuilt from a saved record.
    pub paths: Vec<PairPath>,
}

/// Serializable form of a [`Registration`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub reference_channel: String,
    pub source_height: usize,
    pub source_width: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRect>,
    pub chain: TransformChain,
}

impl Registration {
    pub fn frame_count(&self) -> usize {
        self.chain.len()
    }

    /// (height, width) of the registered output.
    pub fn output_dim(&self) -> (usize, usize) {
        self.crop.map_or(self.source_dim, |r| r.dim())
    }

    pub fn fallback_count(&self) -> usize {
        self.paths
            .iter()
            .filter(|p| **p == PairPath::FeatureSeeded)
            .count()
    }

    /// Crop `stack` like the reference was cropped and resample every frame
    /// with its composed transform.
    pub fn apply(&self, stack: &Stack) -> Result<Stack> {
        self.apply_reported(stack, &NoOpReporter)
    }

    pub fn apply_reported(&self, stack: &Stack, reporter: &dyn ProgressReporter) -> Result<Stack> {
        if stack.dim() != self.source_dim {
            return Err(RegistrationError::ShapeMismatch {
                expected: self.source_dim,
                found: stack.dim(),
            });
        }
        if stack.len() != self.composed.len() {
            return Err(RegistrationError::ChainLengthMismatch {
                transforms: self.composed.len(),
                frames: stack.len(),
            });
        }
        match &self.crop {
            Some(rect) => resample_stack(&crop_stack(stack, rect)?, &self.composed, reporter),
            None => resample_stack(stack, &self.composed, reporter),
        }
    }

    pub fn to_record(&self, reference_channel: &str) -> TransformRecord {
        TransformRecord {
            reference_channel: reference_channel.to_string(),
            source_height: self.source_dim.0,
            source_width: self.source_dim.1,
            crop: self.crop,
            chain: self.chain.clone(),
        }
    }

    /// Rebuild a registration from a saved record, checking the crop fits.
    pub fn from_record(record: &TransformRecord) -> Result<Self> {
        let source_dim = (record.source_height, record.source_width);
        let crop = record
            .crop
            .map(|rect| rect.validated(source_dim))
            .transpose()?;
        Ok(Self {
            crop,
            source_dim,
            composed: record.chain.composed(),
            chain: record.chain.clone(),
            paths: Vec::new(),
        })
    }
}

/// A reference stack cropped to its common valid area, with the production
/// resolver configured from the cropped frames.
pub struct PreparedStack {
    pub cropped: Stack,
    pub crop: Option<CropRect>,
    pub resolver: Resolver<DirectEstimator, FeatureEstimator>,
}

/// Validate `config`, crop `stack` and build the resolver. Per-stack
/// quantization bounds come from the cropped frames only.
pub fn prepare_stack(
    stack: &Stack,
    config: &RegistrationConfig,
    reporter: &dyn ProgressReporter,
) -> Result<PreparedStack> {
    config.validate()?;
    let (cropped, crop) = crop_step(stack, reporter)?;
    let resolver = Resolver::from_config(config, &cropped);
    Ok(PreparedStack {
        cropped,
        crop,
        resolver,
    })
}

/// Crop, estimate and compose with the production estimators.
pub fn register_stack(
    stack: &Stack,
    config: &RegistrationConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Registration> {
    let prepared = prepare_stack(stack, config, reporter)?;
    finish_registration(
        stack,
        prepared.cropped,
        prepared.crop,
        &prepared.resolver,
        reporter,
    )
}

/// [`register_stack`] with caller-supplied estimators.
pub fn register_stack_with<D: DirectAligner, C: CoarseAligner>(
    stack: &Stack,
    resolver: &Resolver<D, C>,
    reporter: &dyn ProgressReporter,
) -> Result<Registration> {
    let (cropped, crop) = crop_step(stack, reporter)?;
    finish_registration(stack, cropped, crop, resolver, reporter)
}

fn crop_step(
    stack: &Stack,
    reporter: &dyn ProgressReporter,
) -> Result<(Stack, Option<CropRect>)> {
    reporter.begin_stage(RegistrationStage::Cropping, None);
    let result = crop_nans_with_rect(stack)?;
    reporter.finish_stage();
    Ok(result)
}

fn finish_registration<D: DirectAligner, C: CoarseAligner>(
    source: &Stack,
    cropped: Stack,
    crop: Option<CropRect>,
    resolver: &Resolver<D, C>,
    reporter: &dyn ProgressReporter,
) -> Result<Registration> {
    let resolved = resolver.resolve_stack(&cropped, reporter)?;
    let composed = resolved.chain.composed();
    Ok(Registration {
        crop,
        source_dim: source.dim(),
        chain: resolved.chain,
        composed,
        paths: resolved.paths,
    })
}

/// Registered stacks for every channel of a job.
#[derive(Clone, Debug)]
pub struct RegisteredChannels {
    pub registration: Registration,
    pub channels: ChannelSet,
    pub reference_channel: String,
    pub units: String,
}

/// Register the reference channel, then resample every channel (reference
/// included) with its transforms. Any failure yields no output at all.
pub fn register_channels(
    channels: &ChannelSet,
    config: &RegistrationConfig,
    reporter: &dyn ProgressReporter,
) -> Result<RegisteredChannels> {
    let reference = channels.reference(&config.reference_channel)?;
    info!(
        reference = %reference.name,
        channels = channels.len(),
        frames = reference.stack.len(),
        "Registering channels"
    );
    let registration = register_stack(&reference.stack, config, reporter)?;
    apply_to_channels(registration, channels, config, reporter)
}

/// Resample every channel with an existing registration.
pub fn apply_to_channels(
    registration: Registration,
    channels: &ChannelSet,
    config: &RegistrationConfig,
    reporter: &dyn ProgressReporter,
) -> Result<RegisteredChannels> {
    let registered = channels
        .iter()
        .map(|channel| {
            registration
                .apply_reported(&channel.stack, reporter)
                .map(|stack| Channel::new(channel.name.clone(), stack))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RegisteredChannels {
        registration,
        channels: ChannelSet::new(registered),
        reference_channel: config.reference_channel.clone(),
        units: config.units.clone(),
    })
}
