use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::access::{AccessControl, AllowAll};
use crate::broadcast::job_progress::{
    JobPhase, JobProgressBroadcaster, JobProgressEvent, ProgressEvent,
};
use crate::broadcast::JobStore;
use crate::error::StoreError;
use crate::generation::{
    BatchSink, GeneratedBatch, GeneratedContent, ImageContext, ImageGenerator, TextContext,
    TextGenerationError, TextGenerator,
};
use crate::model::{BlockUpdate, Collection, JobDescriptor, JobRequest};
use crate::sanitize;
use crate::store::ContentStore;

use super::config::CoordinatorConfig;
use super::context::JobContext;
use super::error::CoordinatorError;
use super::keepalive::KeepAlive;
use super::progress::{ChannelProgress, JobEmitter, ProgressReporter};

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}

/// Runs generation jobs: load, text, images, save.
pub struct GenerationCoordinator {
    config: CoordinatorConfig,
    store: Arc<dyn ContentStore>,
    text: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageGenerator>,
    access: Arc<dyn AccessControl>,
    broadcaster: Option<JobProgressBroadcaster>,
    registry: Option<Arc<JobStore>>,
}

impl GenerationCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn ContentStore>,
        text: Arc<dyn TextGenerator>,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            config,
            store,
            text,
            images,
            access: Arc::new(AllowAll),
            broadcaster: None,
            registry: None,
        }
    }

    pub fn with_access(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = access;
        self
    }

    /// Also publishes every job's events on `broadcaster`.
    pub fn with_broadcaster(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Records every job's terminal event in `registry` once the job ends,
    /// whether or not its broadcast listener kept up.
    pub fn with_registry(mut self, registry: Arc<JobStore>) -> Self {
        self.registry = Some(registry);
        self
    }

    fn reporter_for(&self, sender: mpsc::UnboundedSender<ProgressEvent>, job: &JobDescriptor) -> ChannelProgress {
        let reporter = ChannelProgress::new(sender);
        match &self.broadcaster {
            Some(broadcaster) => reporter.with_broadcast(broadcaster.clone(), job),
            None => reporter,
        }
    }

    /// Validates a wire request and starts the job. An invalid request
    /// yields a stream holding a single `error` event.
    pub fn submit(self: &Arc<Self>, request: JobRequest) -> mpsc::UnboundedReceiver<ProgressEvent> {
        match request.into_descriptor() {
            Ok(job) => self.run(job),
            Err(e) => {
                warn!(error = %e, "Rejected generation request");
                let (tx, rx) = mpsc::unbounded_channel();
                let _ = tx.send(ProgressEvent::error(
                    JobPhase::Loading,
                    &CoordinatorError::Input(e).to_string(),
                ));
                rx
            }
        }
    }

    /// Starts `job` on a new task and returns its event stream. The stream
    /// ends after the terminal event. Dropping the receiver stops delivery
    /// but not the job.
    pub fn run(self: &Arc<Self>, job: JobDescriptor) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Arc::new(self.reporter_for(tx, &job));
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let _ = coordinator.execute(&job, reporter.clone()).await;
            if let (Some(registry), Some(event)) = (&coordinator.registry, reporter.terminal()) {
                registry.record(JobProgressEvent::for_job(&job, event)).await;
            }
        });
        rx
    }

    /// Runs `job` to completion on the current task, reporting every event
    /// (including exactly one terminal event) to `reporter`.
    pub async fn execute(
        &self,
        job: &JobDescriptor,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Collection, CoordinatorError> {
        let emitter = Arc::new(JobEmitter::new(reporter));
        let span = info_span!("generation_job",
            job_id = %job.job_id,
            collection_id = %job.collection_id,
            mode = %job.mode,
        );

        let result = self.drive(job, &emitter).instrument(span).await;
        match &result {
            Ok(_) => info!(job_id = %job.job_id, "Generation job complete"),
            Err(e) => {
                warn!(job_id = %job.job_id, error = %e, "Generation job failed");
                emitter.error(&e.to_string());
            }
        }
        result
    }

    async fn drive(&self, job: &JobDescriptor, emitter: &Arc<JobEmitter>) -> Result<Collection, CoordinatorError> {
        // Load
        emitter.progress(JobPhase::Loading, 0.0, "Loading collection...");
        self.access
            .require_access(&job.owner_id, &job.collection_id)
            .await?;
        let collection = self
            .store
            .load_tree(&job.collection_id)
            .await?
            .ok_or_else(|| CoordinatorError::CollectionNotFound(job.collection_id.clone()))?;

        let mut ctx = JobContext::new(job.clone(), collection);
        emitter.progress(
            JobPhase::Loading,
            100.0,
            &format!(
                "Loaded {} days, {} blocks in scope",
                ctx.working_set.day_indices().len(),
                ctx.working_set.len()
            ),
        );

        if job.mode.includes_text() {
            self.text_phase(&mut ctx, emitter)
                .instrument(info_span!("text_phase"))
                .await?;
        }

        if job.mode.includes_images() {
            self.image_phase(&mut ctx, emitter)
                .instrument(info_span!("image_phase", consistency = job.consistency))
                .await?;
        }

        let content = self
            .save_phase(&ctx, emitter)
            .instrument(info_span!("save_phase"))
            .await?;
        emitter.complete(content.clone());
        Ok(content)
    }

    async fn text_phase(&self, ctx: &mut JobContext, emitter: &Arc<JobEmitter>) -> Result<(), CoordinatorError> {
        let targets = ctx.text_targets();
        let total_days = targets.len();
        if total_days == 0 {
            emitter.phase_complete(
                JobPhase::Text,
                "All days in scope already have copy",
                Some(ctx.collection.clone()),
            );
            return Ok(());
        }

        emitter.progress(
            JobPhase::Text,
            0.0,
            &format!("Generating copy for {} days...", total_days),
        );
        let batch_size = self.config.text_batch_size.max(1);
        emitter.set_ceiling(percent(batch_size.min(total_days), total_days));

        let context = TextContext {
            collection_id: ctx.collection.id.clone(),
            collection_name: ctx.collection.name.clone(),
            days: targets,
        };
        let sink = PersistingSink {
            store: self.store.as_ref(),
            emitter: emitter.as_ref(),
            tree: Mutex::new(ctx.collection.clone()),
            batch_size,
        };

        let result = {
            let _keep_alive = KeepAlive::start(
                emitter.clone(),
                JobPhase::Text,
                self.config.keep_alive_interval,
                self.config.keep_alive_step,
            );
            self.text.generate(&context, &sink).await
        };
        ctx.collection = sink.into_tree();

        match result {
            Ok(_) => {
                emitter.phase_complete(
                    JobPhase::Text,
                    &format!("Generated copy for {} days", total_days),
                    Some(ctx.collection.clone()),
                );
                Ok(())
            }
            Err(TextGenerationError::Partial {
                processed_days,
                total_days,
                partial_content,
                reason,
            }) => {
                warn!(processed_days, total_days, %reason, "Text generation stopped early");
                self.persist_partial(ctx, &partial_content).await?;
                ctx.text_shortfall = Some((processed_days, total_days));
                emitter.progress(
                    JobPhase::Text,
                    percent(processed_days, total_days),
                    &format!(
                        "Generated copy for {} of {} days; {} days were skipped ({}). Continuing.",
                        processed_days,
                        total_days,
                        total_days.saturating_sub(processed_days),
                        reason
                    ),
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes whatever part of a partial result is not yet in the tree.
    async fn persist_partial(&self, ctx: &mut JobContext, content: &GeneratedContent) -> Result<(), StoreError> {
        for day in &content.days {
            for block in &day.blocks {
                if !ctx.working_set.contains(day.day_index, block.block_index) {
                    continue;
                }
                let Some(current) = ctx.collection.block(day.day_index, block.block_index) else {
                    continue;
                };
                let mut merged = current.clone();
                merged.merge_generated(&block.update);
                if merged == *current {
                    continue;
                }
                self.store
                    .update_block(&ctx.collection.id, day.day_index, block.block_index, &block.update)
                    .await?;
                ctx.collection
                    .apply_update(day.day_index, block.block_index, &block.update);
            }
        }
        Ok(())
    }

    async fn image_phase(&self, ctx: &mut JobContext, emitter: &Arc<JobEmitter>) -> Result<(), CoordinatorError> {
        let tasks: Vec<ImageTask> = ctx
            .image_targets()
            .into_iter()
            .filter_map(|(day_index, block_index)| {
                let block = ctx.collection.block(day_index, block_index)?;
                Some(ImageTask {
                    day_index,
                    block_index,
                    prompt: block.image_prompt.clone().unwrap_or_default(),
                    context: ImageContext {
                        collection_id: ctx.collection.id.clone(),
                        block_id: block.id.clone(),
                        content_type: block.content_type.clone(),
                        key_message: block.key_message.clone(),
                        tone_of_voice: block.tone_of_voice.clone(),
                    },
                })
            })
            .collect();
        let total = tasks.len();

        if total == 0 {
            emitter.phase_complete(
                JobPhase::Images,
                "No blocks need images",
                Some(ctx.collection.clone()),
            );
            return Ok(());
        }

        emitter.progress(
            JobPhase::Images,
            0.0,
            &format!("Generating {} images...", total),
        );
        let collection_id = ctx.collection.id.clone();
        let mut processed = 0;

        if ctx.job.consistency {
            let mut references: Vec<String> = Vec::new();
            for task in &tasks {
                let outcome = self.generate_image(&collection_id, task, &references).await;
                processed += 1;
                if let Ok(url) = &outcome {
                    references.push(url.clone());
                }
                Self::record_image(ctx, emitter, task, outcome, processed, total);
            }
        } else {
            for window in tasks.chunks(self.config.image_window.max(1)) {
                debug!(size = window.len(), "Starting image window");
                let mut pending: FuturesUnordered<_> = window
                    .iter()
                    .map(|task| {
                        let collection_id = collection_id.as_str();
                        async move { (task, self.generate_image(collection_id, task, &[]).await) }
                    })
                    .collect();
                while let Some((task, outcome)) = pending.next().await {
                    processed += 1;
                    Self::record_image(ctx, emitter, task, outcome, processed, total);
                }
            }
        }

        emitter.phase_complete(
            JobPhase::Images,
            &format!(
                "Generated {} of {} images ({} skipped)",
                ctx.images_generated, total, ctx.images_skipped
            ),
            Some(ctx.collection.clone()),
        );
        Ok(())
    }

    /// Generates one image and writes its url through to the store. Any
    /// failure is returned as a message; the block keeps its prior url.
    async fn generate_image(&self, collection_id: &str, task: &ImageTask, references: &[String]) -> Result<String, String> {
        let url = if references.is_empty() {
            self.images.generate_image(&task.prompt, &task.context).await
        } else {
            self.images
                .generate_consistent_image(&task.prompt, &task.context, references)
                .await
        }
        .map_err(|e| e.to_string())?;

        self.store
            .update_block(
                collection_id,
                task.day_index,
                task.block_index,
                &BlockUpdate::image(url.clone()),
            )
            .await
            .map_err(|e| format!("generated image could not be saved: {}", e))?;
        Ok(url)
    }

    fn record_image(
        ctx: &mut JobContext,
        emitter: &JobEmitter,
        task: &ImageTask,
        outcome: Result<String, String>,
        processed: usize,
        total: usize,
    ) {
        match outcome {
            Ok(url) => {
                debug!(
                    block_id = %task.context.block_id,
                    url = %sanitize::redact_url(&url),
                    "Image generated"
                );
                ctx.collection
                    .apply_update(task.day_index, task.block_index, &BlockUpdate::image(url));
                ctx.images_generated += 1;
                emitter.block_complete(
                    percent(processed, total),
                    processed,
                    total,
                    &format!("Generated image {} of {}", processed, total),
                    None,
                );
            }
            Err(error) => {
                warn!(block_id = %task.context.block_id, %error, "Skipping image");
                ctx.images_skipped += 1;
                emitter.block_complete(
                    percent(processed, total),
                    processed,
                    total,
                    &format!(
                        "Skipped image {} of {} ({} skipped so far)",
                        processed, total, ctx.images_skipped
                    ),
                    Some(error),
                );
            }
        }
    }

    async fn save_phase(&self, ctx: &JobContext, emitter: &JobEmitter) -> Result<Collection, CoordinatorError> {
        emitter.progress(JobPhase::Saving, 0.0, "Saving content...");
        let id = &ctx.collection.id;
        let persisted = self
            .store
            .load_tree(id)
            .await?
            .ok_or_else(|| CoordinatorError::CollectionNotFound(id.clone()))?;

        let mut reconciled = 0;
        for &(day_index, block_index) in &ctx.working_set.blocks {
            let (Some(ours), Some(stored)) = (
                ctx.collection.block(day_index, block_index),
                persisted.block(day_index, block_index),
            ) else {
                continue;
            };
            let fields = ours.generated_fields();
            let mut merged = stored.clone();
            merged.merge_generated(&fields);
            if merged != *stored {
                self.store
                    .update_block(id, day_index, block_index, &fields)
                    .await?;
                reconciled += 1;
            }
        }
        if reconciled > 0 {
            warn!(reconciled, "Wrote blocks missing from the store");
        }
        emitter.progress(JobPhase::Saving, 50.0, "Finalizing collection...");

        self.store.mark_generated(id).await?;
        let content = self
            .store
            .load_tree(id)
            .await?
            .ok_or_else(|| CoordinatorError::CollectionNotFound(id.clone()))?;

        let summary = match ctx.text_shortfall {
            Some((done, total)) => format!("copy for {} of {} days", done, total),
            None => "copy complete".to_string(),
        };
        info!(
            images_generated = ctx.images_generated,
            images_skipped = ctx.images_skipped,
            "Saved collection ({})",
            summary
        );
        Ok(content)
    }
}

struct ImageTask {
    day_index: usize,
    block_index: usize,
    prompt: String,
    context: ImageContext,
}

/// Persists each text batch before the generator moves on, then merges it
/// into the in-memory tree.
struct PersistingSink<'a> {
    store: &'a dyn ContentStore,
    emitter: &'a JobEmitter,
    tree: Mutex<Collection>,
    batch_size: usize,
}

impl PersistingSink<'_> {
    fn into_tree(self) -> Collection {
        self.tree
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collection_id(&self) -> String {
        self.tree
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .id
            .clone()
    }
}

#[async_trait]
impl BatchSink for PersistingSink<'_> {
    async fn on_batch(&self, batch: &GeneratedBatch) -> Result<(), StoreError> {
        let collection_id = self.collection_id();
        let mut written = 0;
        for day in &batch.days {
            for block in &day.blocks {
                if block.update.is_empty() {
                    continue;
                }
                self.store
                    .update_block(&collection_id, day.day_index, block.block_index, &block.update)
                    .await?;
                self.tree
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .apply_update(day.day_index, block.block_index, &block.update);
                written += 1;
            }
        }
        debug!(
            batch = batch.batch_number,
            of = batch.total_batches,
            blocks = written,
            "Persisted copy batch"
        );

        let next_milestone = (batch.processed_days + self.batch_size).min(batch.total_days);
        self.emitter.progress(
            JobPhase::Text,
            percent(batch.processed_days, batch.total_days),
            &format!(
                "Generated copy for {} of {} days",
                batch.processed_days, batch.total_days
            ),
        );
        self.emitter
            .set_ceiling(percent(next_milestone, batch.total_days));
        Ok(())
    }
}
