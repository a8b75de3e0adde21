use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use stackreg_core::pipeline::NoOpReporter;
use tracing::error;

use super::register::{register_job, save_transforms, RegistrationOptions};
use crate::summary::{print_batch_summary, print_registration_summary};

#[derive(Args)]
pub struct BatchArgs {
    /// Job directories, each with one frame sub-directory or .stk file per channel
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output root; each job is written to a sub-directory named after it,
    /// with an index suffix when several inputs share a name
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub options: RegistrationOptions,

    /// Also write `transforms.toml` into every job's output directory
    #[arg(long)]
    pub save_transforms: bool,

    /// Save PNG previews of unregistrable frame pairs, one sub-directory per job
    #[arg(long)]
    pub failure_dir: Option<PathBuf>,
}

/// Outcome of one batch job.
pub struct JobReport {
    pub input: PathBuf,
    pub outcome: std::result::Result<JobStats, String>,
}

pub struct JobStats {
    pub frames: usize,
    pub channels: usize,
    pub fallbacks: usize,
    pub output_dim: (usize, usize),
}

pub fn run(args: &BatchArgs) -> Result<()> {
    let config = args.options.resolve()?;
    print_registration_summary(&config, Path::new("(batch)"), &args.output);

    let pb = ProgressBar::new(args.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Jobs [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let names = job_names(&args.inputs);
    let reports: Vec<JobReport> = args
        .inputs
        .par_iter()
        .zip(names.par_iter())
        .map(|(input, name)| {
            let output = args.output.join(name);
            let failure_dir = args.failure_dir.as_ref().map(|d| d.join(name));

            let outcome = register_job(input, &output, &config, &NoOpReporter, failure_dir.as_deref())
                .and_then(|registered| {
                    if args.save_transforms {
                        save_transforms(&registered, &output.join("transforms.toml"))?;
                    }
                    Ok(JobStats {
                        frames: registered.registration.frame_count(),
                        channels: registered.channels.len(),
                        fallbacks: registered.registration.fallback_count(),
                        output_dim: registered.registration.output_dim(),
                    })
                })
                .map_err(|e| {
                    error!(job = %input.display(), "{e:#}");
                    format!("{e:#}")
                });
            pb.inc(1);
            JobReport {
                input: input.clone(),
                outcome,
            }
        })
        .collect();
    pb.finish();

    print_batch_summary(&reports);

    let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
    if failed > 0 {
        bail!("{failed} of {} jobs failed", reports.len());
    }
    Ok(())
}

fn job_name(input: &Path) -> String {
    let base = |p: &Path| p.file_name().map(|n| n.to_string_lossy().to_string());
    base(input)
        .or_else(|| input.canonicalize().ok().and_then(|p| base(&p)))
        .unwrap_or_else(|| "job".to_string())
}

/// Output sub-directory name per input, in input order. Repeated names get
/// an index suffix so that no two jobs share an output directory.
fn job_names(inputs: &[PathBuf]) -> Vec<String> {
    let bases: Vec<String> = inputs.iter().map(|p| job_name(p)).collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(bases.len());
    for (i, base) in bases.iter().enumerate() {
        let repeated = bases.iter().filter(|b| *b == base).count() > 1;
        let mut name = if repeated {
            format!("{base}_{}", i + 1)
        } else {
            base.clone()
        };
        while taken.contains(&name) || (repeated && bases.contains(&name)) {
            name.push('_');
        }
        taken.insert(name.clone());
        names.push(name);
    }
    names
}
