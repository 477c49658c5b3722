//! Registry of generation jobs, fed from progress events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::broadcast::job_progress::{
    EventType, JobPhase, JobProgressBroadcaster, JobProgressEvent,
};
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::{Database, DatabaseError};
use crate::model::GenerationMode;

/// Lifecycle state of a job as seen by the registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    fn parse(s: &str, job_id: &str) -> Self {
        match s {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            other => {
                log::warn!(
                    "Unknown job status '{}' for job {}, defaulting to Failed",
                    other,
                    job_id
                );
                JobStatus::Failed
            }
        }
    }
}

fn phase_to_str(phase: JobPhase) -> &'static str {
    match phase {
        JobPhase::Loading => "loading",
        JobPhase::Text => "text",
        JobPhase::Images => "images",
        JobPhase::Saving => "saving",
    }
}

fn parse_phase(s: &str, job_id: &str) -> JobPhase {
    match s {
        "loading" => JobPhase::Loading,
        "text" => JobPhase::Text,
        "images" => JobPhase::Images,
        "saving" => JobPhase::Saving,
        other => {
            log::warn!(
                "Unknown job phase '{}' for job {}, defaulting to Loading",
                other,
                job_id
            );
            JobPhase::Loading
        }
    }
}

fn parse_mode(s: &str) -> GenerationMode {
    match s {
        "text" => GenerationMode::Text,
        "images" => GenerationMode::Images,
        _ => GenerationMode::All,
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

/// Last known state of one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredJob {
    pub job_id: String,
    pub collection_id: String,
    pub owner_id: String,
    pub mode: GenerationMode,
    pub status: JobStatus,
    pub phase: JobPhase,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Images that failed and were skipped.
    pub skipped_blocks: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StoredJob {
    pub fn from_event(event: &JobProgressEvent) -> Self {
        let mut job = Self {
            job_id: event.job_id.clone(),
            collection_id: event.collection_id.clone(),
            owner_id: event.owner_id.clone(),
            mode: event.mode,
            status: JobStatus::Running,
            phase: event.event.phase,
            progress: 0,
            message: String::new(),
            error: None,
            skipped_blocks: 0,
            started_at: event.event.timestamp,
            updated_at: event.event.timestamp,
            completed_at: None,
        };
        job.update_from_event(event);
        job
    }

    pub fn from_job_row(row: &JobRow) -> Self {
        Self {
            job_id: row.id.clone(),
            collection_id: row.collection_id.clone(),
            owner_id: row.owner_id.clone(),
            mode: parse_mode(&row.mode),
            status: JobStatus::parse(&row.status, &row.id),
            phase: parse_phase(&row.phase, &row.id),
            progress: row.progress,
            message: row.message.clone().unwrap_or_default(),
            error: row.error.clone(),
            skipped_blocks: row.skipped_blocks,
            started_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            completed_at: row.completed_at.as_deref().map(parse_timestamp),
        }
    }

    pub fn to_job_row(&self) -> JobRow {
        JobRow {
            id: self.job_id.clone(),
            collection_id: self.collection_id.clone(),
            owner_id: self.owner_id.clone(),
            mode: self.mode.to_string(),
            status: self.status.as_str().to_string(),
            phase: phase_to_str(self.phase).to_string(),
            progress: self.progress,
            message: Some(self.message.clone()),
            error: self.error.clone(),
            skipped_blocks: self.skipped_blocks,
            created_at: self.started_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
            completed_at: self.completed_at.map(|t| t.to_rfc3339()),
        }
    }

    /// Applies an event. A finished job ignores everything that arrives
    /// after its terminal event.
    pub fn update_from_event(&mut self, event: &JobProgressEvent) {
        if self.is_finished() {
            return;
        }
        let e = &event.event;
        self.phase = e.phase;
        self.progress = e.progress;
        self.message = e.message.clone();
        self.updated_at = e.timestamp;

        match e.event_type {
            EventType::BlockComplete if e.error.is_some() => self.skipped_blocks += 1,
            EventType::Complete => {
                self.status = JobStatus::Completed;
                self.completed_at = Some(e.timestamp);
            }
            EventType::Error => {
                self.status = JobStatus::Failed;
                self.error = e.error.clone();
                self.completed_at = Some(e.timestamp);
            }
            _ => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != JobStatus::Running
    }
}

/// Query parameters for job listing.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQueryParams {
    pub owner_id: Option<String>,
    pub collection_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListResponse {
    pub jobs: Vec<StoredJob>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Job registry with an in-memory cache and optional database persistence.
///
/// Uses `std::sync::RwLock`; every database call is a short synchronous
/// statement. Async callers go through [`JobStore::record`], which runs it
/// on the blocking pool.
#[derive(Default)]
pub struct JobStore {
    db: RwLock<Option<Database>>,
    cache: RwLock<HashMap<String, StoredJob>>,
    /// Orders cache updates with their upserts across writers.
    persist: Mutex<()>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a database. Jobs a previous process left running are
    /// marked failed.
    pub fn set_database(&self, db: Database) {
        match job_repo::fail_interrupted(&db, &Utc::now().to_rfc3339()) {
            Ok(0) => {}
            Ok(n) => log::warn!("Marked {} interrupted generation job(s) as failed", n),
            Err(e) => log::error!("Failed to mark interrupted jobs: {}", e),
        }
        let mut guard = match self.db.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(db);
    }

    fn database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    /// Applies an event to the cache and returns the updated job.
    pub fn update(&self, event: &JobProgressEvent) -> StoredJob {
        let mut cache = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let job = cache
            .entry(event.job_id.clone())
            .and_modify(|job| job.update_from_event(event))
            .or_insert_with(|| StoredJob::from_event(event));
        job.clone()
    }

    /// Updates the cache and persists the job to the database, if attached.
    pub fn update_and_persist(&self, event: &JobProgressEvent) {
        let _order = self
            .persist
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let job = self.update(event);
        if let Some(db) = self.database() {
            if let Err(e) = job_repo::upsert(&db, &job.to_job_row()) {
                log::error!("Failed to persist job {}: {}", job.job_id, e);
            }
        }
    }

    /// Applies `event` and persists the job on the blocking pool.
    pub async fn record(self: &Arc<Self>, event: JobProgressEvent) {
        let store = Arc::clone(self);
        let job_id = event.job_id.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || store.update_and_persist(&event)).await {
            log::error!("Failed to record event of job {}: {}", job_id, e);
        }
    }

    /// Returns a job by id, checking the cache then the database.
    pub fn get(&self, job_id: &str) -> Option<StoredJob> {
        let cached = match self.cache.read() {
            Ok(guard) => guard.get(job_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(job_id).cloned(),
        };
        if cached.is_some() {
            return cached;
        }
        let db = self.database()?;
        match job_repo::find_by_id(&db, job_id) {
            Ok(row) => row.as_ref().map(StoredJob::from_job_row),
            Err(e) => {
                log::error!("Failed to load job {}: {}", job_id, e);
                None
            }
        }
    }

    /// Lists jobs newest first, from the database when attached.
    pub fn query(&self, params: &JobQueryParams) -> Result<JobListResponse, DatabaseError> {
        if let Some(db) = self.database() {
            let filter = JobFilter {
                owner_id: params.owner_id.clone(),
                collection_id: params.collection_id.clone(),
                status: params.status.clone(),
                limit: params.limit,
                offset: params.offset,
            };
            let (rows, total) = job_repo::query(&db, &filter)?;
            return Ok(JobListResponse {
                jobs: rows.iter().map(StoredJob::from_job_row).collect(),
                total,
                limit: params.limit,
                offset: params.offset,
            });
        }

        let cache = match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut jobs: Vec<StoredJob> = cache
            .values()
            .filter(|j| params.owner_id.as_ref().is_none_or(|o| &j.owner_id == o))
            .filter(|j| {
                params
                    .collection_id
                    .as_ref()
                    .is_none_or(|c| &j.collection_id == c)
            })
            .filter(|j| params.status.as_ref().is_none_or(|s| j.status.as_str() == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let total = jobs.len() as u64;
        let offset = params.offset.unwrap_or(0) as usize;
        let limit = params.limit.unwrap_or(100) as usize;
        Ok(JobListResponse {
            jobs: jobs.into_iter().skip(offset).take(limit).collect(),
            total,
            limit: params.limit,
            offset: params.offset,
        })
    }

    /// Number of jobs still running (from cache).
    pub fn running_count(&self) -> usize {
        match self.cache.read() {
            Ok(guard) => guard.values().filter(|j| !j.is_finished()).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .values()
                .filter(|j| !j.is_finished())
                .count(),
        }
    }

    /// Feeds every broadcast event into the store until the broadcaster closes.
    pub fn spawn_listener(
        self: Arc<Self>,
        broadcaster: &JobProgressBroadcaster,
    ) -> tokio::task::JoinHandle<()> {
        let mut rx = broadcaster.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.record(event).await,
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("Job store listener lagged, missed {} events", n);
                    }
                    Err(RecvError::Closed) => {
                        log::info!("Job progress broadcaster closed, stopping job store listener");
                        break;
                    }
                }
            }
        })
    }
}
