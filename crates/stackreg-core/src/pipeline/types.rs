/// Registration stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationStage {
    Cropping,
    Estimating,
    Resampling,
    Writing,
}

impl std::fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cropping => write!(f, "Cropping"),
            Self::Estimating => write!(f, "Estimating transforms"),
            Self::Resampling => write!(f, "Resampling frames"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for a registration job.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (frame pairs or frames), if known.
    fn begin_stage(&self, _stage: RegistrationStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when the caller supplies none.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
