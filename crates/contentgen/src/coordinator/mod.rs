pub mod config;
pub mod context;
pub mod error;
pub mod keepalive;
pub mod progress;
pub mod runner;

pub use config::CoordinatorConfig;
pub use context::JobContext;
pub use error::CoordinatorError;
pub use progress::{ChannelProgress, JobEmitter, ProgressReporter};
pub use runner::GenerationCoordinator;
