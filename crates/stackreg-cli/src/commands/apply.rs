use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use stackreg_core::io::{DirectorySource, StackSource};
use stackreg_core::pipeline::config::RegistrationConfig;
use stackreg_core::pipeline::{apply_to_channels, Registration, TransformRecord};

use super::register::write_job;
use crate::progress::BarReporter;
use crate::summary::print_job_result;

#[derive(Args)]
pub struct ApplyArgs {
    /// Job directory holding one frame sub-directory or .stk file per channel
    pub input: PathBuf,

    /// Transforms saved by `register --save-transforms`
    #[arg(long)]
    pub transforms: PathBuf,

    /// Output directory for the registered .stk files
    #[arg(short, long)]
    pub output: PathBuf,

    /// Unit label written with every stack
    #[arg(long)]
    pub units: Option<String>,
}

pub fn run(args: &ApplyArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.transforms)
        .with_context(|| format!("Failed to read transforms {}", args.transforms.display()))?;
    let record: TransformRecord = toml::from_str(&contents).context("Invalid transforms file")?;
    let registration = Registration::from_record(&record).context("Invalid transforms file")?;

    let mut config = RegistrationConfig {
        reference_channel: record.reference_channel.clone(),
        ..RegistrationConfig::default()
    };
    if let Some(ref units) = args.units {
        config.units = units.clone();
    }

    let source = DirectorySource::open(&args.input)
        .with_context(|| format!("Failed to open job {}", args.input.display()))?;
    let channels = source
        .load_channels()
        .with_context(|| format!("Failed to load channels from {}", args.input.display()))?;

    println!(
        "Applying {} transforms from {} to {} channel(s)",
        registration.frame_count(),
        args.transforms.display(),
        channels.len()
    );

    let reporter = BarReporter::new()?;
    let registered = apply_to_channels(registration, &channels, &config, &reporter)
        .context("Failed to apply transforms")?;
    write_job(&registered, &args.output, &reporter)?;
    reporter.finish("Done");

    print_job_result(&registered, &args.output);
    Ok(())
}
