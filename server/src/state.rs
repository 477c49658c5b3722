use std::sync::Arc;

use contentgen::{FileObjectStorage, GenerationCoordinator, JobStore};

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<GenerationCoordinator>,
    pub job_store: Arc<JobStore>,
    /// Local object storage served under `/media`. `None` disables the route.
    pub media: Option<Arc<FileObjectStorage>>,
}
