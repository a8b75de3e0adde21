use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Invalid stack file: {0}")]
    InvalidStackFile(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not enough feature matches: found {found}, need 3")]
    InsufficientFeatures { found: usize },

    #[error("Feature correspondences are degenerate: {0}")]
    DegenerateCorrespondence(String),

    #[error("Direct alignment did not converge: {0}")]
    ConvergenceFailure(String),

    #[error("Frames {prev} and {curr} could not be registered (direct: {direct}; fallback: {fallback})")]
    UnregistrablePair {
        prev: usize,
        curr: usize,
        direct: Box<RegistrationError>,
        fallback: Box<RegistrationError>,
    },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Transform chain has {transforms} entries but the stack has {frames} frames")]
    ChainLengthMismatch { transforms: usize, frames: usize },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

impl RegistrationError {
    /// Estimator-level failures the pairwise resolver may retry past.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InsufficientFeatures { .. }
                | Self::DegenerateCorrespondence(_)
                | Self::ConvergenceFailure(_)
        )
    }

    /// Frame pair indices for an unregistrable pair, if this is one.
    pub fn failed_pair(&self) -> Option<(usize, usize)> {
        match self {
            Self::UnregistrablePair { prev, curr, .. } => Some((*prev, *curr)),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
