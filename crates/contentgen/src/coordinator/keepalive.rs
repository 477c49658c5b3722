use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::progress::JobEmitter;
use crate::broadcast::job_progress::JobPhase;

/// Emits synthetic progress while a long call is awaited. The ticker task is
/// aborted when this guard is dropped.
pub struct KeepAlive {
    handle: JoinHandle<()>,
}

impl KeepAlive {
    pub fn start(emitter: Arc<JobEmitter>, phase: JobPhase, every: Duration, step: f64) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if emitter.is_finished() {
                    break;
                }
                emitter.nudge(phase, step, "Still generating copy...");
            }
        });
        Self { handle }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
