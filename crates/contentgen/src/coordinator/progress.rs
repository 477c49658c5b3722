//! Delivery of a job's progress events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::broadcast::job_progress::{
    round_progress, JobPhase, JobProgressBroadcaster, JobProgressEvent, ProgressEvent,
};
use crate::model::{Collection, JobDescriptor};

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Sends events to the job's stream consumer and, when attached, to the
/// job-wide broadcaster. A failed send marks the stream closed; later
/// events still reach the broadcaster. The terminal event is kept.
pub struct ChannelProgress {
    sender: mpsc::UnboundedSender<ProgressEvent>,
    closed: AtomicBool,
    broadcast: Option<(JobProgressBroadcaster, JobDescriptor)>,
    terminal: Mutex<Option<ProgressEvent>>,
}

impl ChannelProgress {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            sender,
            closed: AtomicBool::new(false),
            broadcast: None,
            terminal: Mutex::new(None),
        }
    }

    /// The `complete` or `error` event, once reported.
    pub fn terminal(&self) -> Option<ProgressEvent> {
        self.terminal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn with_broadcast(mut self, broadcaster: JobProgressBroadcaster, job: &JobDescriptor) -> Self {
        self.broadcast = Some((broadcaster, job.clone()));
        self
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        if event.is_terminal() {
            *self
                .terminal
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(event.clone());
        }
        if let Some((broadcaster, job)) = &self.broadcast {
            broadcaster.send(JobProgressEvent::for_job(job, event.clone()));
        }

        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        if self.sender.send(event).is_err() {
            self.closed.store(true, Ordering::Relaxed);
            log::info!("Progress stream consumer disconnected, no longer streaming events");
        }
    }
}

struct EmitterState {
    phase: JobPhase,
    /// Unrounded progress of the current phase.
    last: f64,
    /// Upper bound (exclusive) for keep-alive increments.
    ceiling: f64,
    finished: bool,
}

/// Builds a job's event sequence: progress never decreases within a phase,
/// and at most one terminal event is ever emitted.
pub struct JobEmitter {
    reporter: Arc<dyn ProgressReporter>,
    state: Mutex<EmitterState>,
}

impl JobEmitter {
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            state: Mutex::new(EmitterState {
                phase: JobPhase::Loading,
                last: 0.0,
                ceiling: 100.0,
                finished: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves to `phase` (resetting progress on a change) and returns the
    /// value to report, never below the last one.
    fn advance(state: &mut EmitterState, phase: JobPhase, value: f64) -> f64 {
        if state.phase != phase {
            state.phase = phase;
            state.last = 0.0;
            state.ceiling = 100.0;
        }
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) };
        state.last = state.last.max(value);
        state.last
    }

    fn send(&self, state: &EmitterState, event: ProgressEvent) {
        if state.finished && !event.is_terminal() {
            return;
        }
        self.reporter.report(event);
    }

    pub fn progress(&self, phase: JobPhase, value: f64, message: &str) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        let value = Self::advance(&mut state, phase, value);
        self.send(&state, ProgressEvent::progress(phase, value, message));
    }

    pub fn block_complete(
        &self,
        value: f64,
        current_block: usize,
        total_blocks: usize,
        message: &str,
        error: Option<String>,
    ) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        let value = Self::advance(&mut state, JobPhase::Images, value);
        self.send(
            &state,
            ProgressEvent::block_complete(value, current_block, total_blocks, message, error),
        );
    }

    pub fn phase_complete(&self, phase: JobPhase, message: &str, content: Option<Collection>) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        Self::advance(&mut state, phase, 100.0);
        self.send(&state, ProgressEvent::phase_complete(phase, message, content));
    }

    /// Emits the `complete` event unless the job already ended.
    pub fn complete(&self, content: Collection) {
        let mut state = self.lock();
        if state.finished {
            log::debug!("Dropping completion of an already finished job");
            return;
        }
        Self::advance(&mut state, JobPhase::Saving, 100.0);
        state.finished = true;
        self.send(&state, ProgressEvent::complete(content));
    }

    /// Emits the `error` event in the current phase unless the job already ended.
    pub fn error(&self, message: &str) {
        let mut state = self.lock();
        if state.finished {
            log::debug!("Dropping error of an already finished job: {}", message);
            return;
        }
        state.finished = true;
        let mut event = ProgressEvent::error(state.phase, message);
        event.progress = round_progress(state.last);
        self.send(&state, event);
    }

    /// Caps keep-alive increments of the current phase below `ceiling`.
    pub fn set_ceiling(&self, ceiling: f64) {
        let mut state = self.lock();
        state.ceiling = ceiling.clamp(0.0, 100.0);
    }

    /// Adds `step` to the current phase's progress if that stays below the
    /// ceiling. Returns whether an event was emitted.
    pub fn nudge(&self, phase: JobPhase, step: f64, message: &str) -> bool {
        let mut state = self.lock();
        if state.finished || state.phase != phase {
            return false;
        }
        let next = state.last + step;
        if next >= state.ceiling {
            return false;
        }
        state.last = next;
        self.send(&state, ProgressEvent::progress(phase, next, message));
        true
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }
}
