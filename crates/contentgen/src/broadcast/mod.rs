//! Job-wide event broadcasting and the job registry.

pub mod job_progress;
pub mod job_store;

pub use job_progress::{
    round_progress, EventType, JobPhase, JobProgressBroadcaster, JobProgressEvent, ProgressEvent,
};
pub use job_store::{JobListResponse, JobQueryParams, JobStatus, JobStore, StoredJob};
