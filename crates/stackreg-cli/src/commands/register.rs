use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use stackreg_core::frame::ChannelSet;
use stackreg_core::io::image_io::save_preview_png;
use stackreg_core::io::{DirectorySource, StackFileSink, StackSink, StackSource};
use stackreg_core::pipeline::config::{IntensityBounds, MotionModel, RegistrationConfig};
use stackreg_core::pipeline::{
    register_channels, ProgressReporter, RegisteredChannels, RegistrationStage,
};
use tracing::warn;

use crate::progress::BarReporter;
use crate::summary::{print_job_result, print_registration_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum BoundsArg {
    /// Quantize each frame with its own sigma window (default)
    PerPair,
    /// One sigma window computed over the whole reference stack
    PerStack,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MotionArg {
    Translation,
    Euclidean,
    Affine,
}

/// Config options shared by `register` and `batch`. Flags override values
/// from the config file.
#[derive(Args)]
pub struct RegistrationOptions {
    /// Registration config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Channel whose stack drives transform estimation
    #[arg(long)]
    pub reference: Option<String>,

    /// Intensity window used to quantize frames for feature matching
    #[arg(long, value_enum)]
    pub bounds: Option<BoundsArg>,

    /// Motion model for direct alignment
    #[arg(long, value_enum)]
    pub motion: Option<MotionArg>,
}

impl RegistrationOptions {
    pub fn resolve(&self) -> Result<RegistrationConfig> {
        let mut config = if let Some(ref path) = self.config {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&contents).context("Invalid registration config")?
        } else {
            RegistrationConfig::default()
        };

        if let Some(ref reference) = self.reference {
            config.reference_channel = reference.clone();
        }
        if let Some(bounds) = self.bounds {
            config.preprocess.bounds = match bounds {
                BoundsArg::PerPair => IntensityBounds::PerPair,
                BoundsArg::PerStack => IntensityBounds::PerStack,
            };
        }
        if let Some(motion) = self.motion {
            config.direct.motion = match motion {
                MotionArg::Translation => MotionModel::Translation,
                MotionArg::Euclidean => MotionModel::Euclidean,
                MotionArg::Affine => MotionModel::Affine,
            };
        }
        config.validate().context("Invalid registration config")?;
        Ok(config)
    }
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Job directory holding one frame sub-directory or .stk file per channel
    pub input: PathBuf,

    /// Output directory for the registered .stk files
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub options: RegistrationOptions,

    /// Save the transform chain as TOML for later `apply`
    #[arg(long)]
    pub save_transforms: Option<PathBuf>,

    /// Save PNG previews of an unregistrable frame pair into this directory
    #[arg(long)]
    pub failure_dir: Option<PathBuf>,
}

pub fn run(args: &RegisterArgs) -> Result<()> {
    let config = args.options.resolve()?;
    print_registration_summary(&config, &args.input, &args.output);

    let reporter = BarReporter::new()?;
    let registered = match register_job(
        &args.input,
        &args.output,
        &config,
        &reporter,
        args.failure_dir.as_deref(),
    ) {
        Ok(registered) => registered,
        Err(e) => {
            reporter.abandon();
            return Err(e);
        }
    };
    reporter.finish("Done");

    if let Some(ref path) = args.save_transforms {
        save_transforms(&registered, path)?;
        println!("Transforms saved to {}", path.display());
    }
    print_job_result(&registered, &args.output);
    Ok(())
}

/// Load, register and write one job. On an unregistrable pair the two
/// offending reference frames are previewed into `failure_dir`.
pub fn register_job(
    input: &Path,
    output: &Path,
    config: &RegistrationConfig,
    reporter: &dyn ProgressReporter,
    failure_dir: Option<&Path>,
) -> Result<RegisteredChannels> {
    let source = DirectorySource::open(input)
        .with_context(|| format!("Failed to open job {}", input.display()))?;
    let channels = source
        .load_channels()
        .with_context(|| format!("Failed to load channels from {}", input.display()))?;

    let registered = match register_channels(&channels, config, reporter) {
        Ok(registered) => registered,
        Err(e) => {
            if let (Some((prev, curr)), Some(dir)) = (e.failed_pair(), failure_dir) {
                report_failed_pair(&channels, &config.reference_channel, prev, curr, dir);
            }
            return Err(e).with_context(|| format!("Registration of {} failed", input.display()));
        }
    };

    write_job(&registered, output, reporter)?;
    Ok(registered)
}

/// Write every registered channel as `<output>/<channel>.stk`.
pub fn write_job(
    registered: &RegisteredChannels,
    output: &Path,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let sink = StackFileSink::new(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    reporter.begin_stage(RegistrationStage::Writing, Some(registered.channels.len()));
    for (i, channel) in registered.channels.iter().enumerate() {
        sink.write_registered(
            &channel.name,
            &channel.stack,
            &registered.units,
            &registered.reference_channel,
        )
        .with_context(|| format!("Failed to write {}", sink.path_for(&channel.name).display()))?;
        reporter.advance(i + 1);
    }
    reporter.finish_stage();
    Ok(())
}

pub fn save_transforms(registered: &RegisteredChannels, path: &Path) -> Result<()> {
    let record = registered
        .registration
        .to_record(&registered.reference_channel);
    let toml_str = toml::to_string_pretty(&record)?;
    std::fs::write(path, toml_str)
        .with_context(|| format!("Failed to write transforms to {}", path.display()))
}

fn report_failed_pair(channels: &ChannelSet, reference: &str, prev: usize, curr: usize, dir: &Path) {
    if let Err(e) = save_pair_previews(channels, reference, prev, curr, dir) {
        warn!(error = %e, dir = %dir.display(), "Could not save failure previews");
    }
}

fn save_pair_previews(
    channels: &ChannelSet,
    reference: &str,
    prev: usize,
    curr: usize,
    dir: &Path,
) -> Result<()> {
    let channel = channels.reference(reference)?;
    std::fs::create_dir_all(dir)?;
    for index in [prev, curr] {
        let frame = channel
            .stack
            .frame(index)
            .with_context(|| format!("Frame {index} missing from {reference}"))?;
        let path = dir.join(format!("{reference}_frame{index:04}.png"));
        save_preview_png(frame, &path)?;
        eprintln!("Saved failure preview {}", path.display());
    }
    Ok(())
}
