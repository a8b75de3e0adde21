use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use stackreg_core::pipeline::{ProgressReporter, RegistrationStage};

/// Drives one terminal progress bar through the registration stages.
pub struct BarReporter {
    bar: ProgressBar,
    counted: ProgressStyle,
    spinner: ProgressStyle,
}

impl BarReporter {
    pub fn new() -> Result<Self> {
        let counted = ProgressStyle::default_bar()
            .template("{msg:24} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> ");
        let spinner = ProgressStyle::default_spinner().template("{spinner} {msg}")?;
        Ok(Self {
            bar: ProgressBar::new(0),
            counted,
            spinner,
        })
    }

    pub fn finish(&self, message: &'static str) {
        self.bar.finish_with_message(message);
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: RegistrationStage, total_items: Option<usize>) {
        match total_items {
            Some(total) => {
                self.bar.set_style(self.counted.clone());
                self.bar.set_length(total as u64);
                self.bar.set_position(0);
            }
            None => self.bar.set_style(self.spinner.clone()),
        }
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        self.bar.tick();
    }
}
