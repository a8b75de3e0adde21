pub mod config;
mod orchestrator;
pub mod types;

pub use orchestrator::{
    apply_to_channels, prepare_stack, register_channels, register_stack, register_stack_with,
    PreparedStack, RegisteredChannels, Registration, TransformRecord,
};
pub use types::{NoOpReporter, ProgressReporter, RegistrationStage};
