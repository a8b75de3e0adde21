pub mod consts;
pub mod crop;
pub mod direct;
pub mod error;
pub mod features;
pub mod filters;
pub mod frame;
pub mod io;
pub mod pipeline;
pub mod preprocess;
pub mod resolver;
pub mod transform;
pub mod warp;

pub use error::{RegistrationError, Result};
pub use frame::{Channel, ChannelSet, Frame, Stack};
pub use pipeline::{register_channels, register_stack, Registration};
pub use transform::{AffineTransform, TransformChain};
