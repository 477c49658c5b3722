//! Progress events and the job progress broadcaster.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{Collection, GenerationMode, JobDescriptor};

/// Phase of a generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Loading,
    Text,
    Images,
    Saving,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Loading => write!(f, "Loading"),
            JobPhase::Text => write!(f, "Generating text"),
            JobPhase::Images => write!(f, "Generating images"),
            JobPhase::Saving => write!(f, "Saving"),
        }
    }
}

/// Kind of progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Progress,
    BlockComplete,
    PhaseComplete,
    Complete,
    Error,
}

impl EventType {
    /// `complete` and `error` end a job's stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventType::Complete | EventType::Error)
    }
}

/// One frame of a job's progress stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Whole-number percentage within the current phase.
    pub progress: u8,
    pub message: String,
    pub phase: JobPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_block: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_blocks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_content: Option<Collection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Rounds to the nearest whole percentage and clamps into [0, 100].
pub fn round_progress(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

impl ProgressEvent {
    fn base(event_type: EventType, phase: JobPhase, progress: f64, message: &str) -> Self {
        Self {
            event_type,
            progress: round_progress(progress),
            message: message.to_string(),
            phase,
            current_block: None,
            total_blocks: None,
            updated_content: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn progress(phase: JobPhase, progress: f64, message: &str) -> Self {
        Self::base(EventType::Progress, phase, progress, message)
    }

    pub fn block_complete(
        progress: f64,
        current_block: usize,
        total_blocks: usize,
        message: &str,
        error: Option<String>,
    ) -> Self {
        let mut event = Self::base(EventType::BlockComplete, JobPhase::Images, progress, message);
        event.current_block = Some(current_block);
        event.total_blocks = Some(total_blocks);
        event.error = error;
        event
    }

    pub fn phase_complete(phase: JobPhase, message: &str, content: Option<Collection>) -> Self {
        let mut event = Self::base(EventType::PhaseComplete, phase, 100.0, message);
        event.updated_content = content;
        event
    }

    pub fn complete(content: Collection) -> Self {
        let mut event = Self::base(
            EventType::Complete,
            JobPhase::Saving,
            100.0,
            "Content generation complete",
        );
        event.updated_content = Some(content);
        event
    }

    pub fn error(phase: JobPhase, error: &str) -> Self {
        let mut event = Self::base(EventType::Error, phase, 0.0, "Content generation failed");
        event.error = Some(error.to_string());
        event
    }

    pub fn is_terminal(&self) -> bool {
        self.event_type.is_terminal()
    }
}

/// A progress event tagged with the job it belongs to.
#[derive(Debug, Clone)]
pub struct JobProgressEvent {
    pub job_id: String,
    pub collection_id: String,
    pub owner_id: String,
    pub mode: GenerationMode,
    pub event: ProgressEvent,
}

impl JobProgressEvent {
    pub fn for_job(job: &JobDescriptor, event: ProgressEvent) -> Self {
        Self {
            job_id: job.job_id.clone(),
            collection_id: job.collection_id.clone(),
            owner_id: job.owner_id.clone(),
            mode: job.mode,
            event,
        }
    }
}

/// Broadcasts progress events of all jobs to observers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
