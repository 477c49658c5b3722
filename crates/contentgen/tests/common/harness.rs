//! Runs generation jobs in isolation and captures their event streams.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use contentgen::broadcast::{EventType, JobPhase, ProgressEvent};
use contentgen::generation::{BatchingTextGenerator, ImageGenerator, TextGenerator};
use contentgen::model::{Collection, JobDescriptor, JobRequest};
use contentgen::{
    ContentStore, CoordinatorConfig, GenerationCoordinator, MemoryStore, StoreAccessControl,
};

use super::builders::{ScriptedCopy, ScriptedImages, SharedCopy};

/// Coordinator settings with a keep-alive slow enough never to fire.
pub fn quiet_config(text_batch_size: usize, image_window: usize) -> CoordinatorConfig {
    CoordinatorConfig {
        text_batch_size,
        image_window,
        keep_alive_interval: Duration::from_secs(3600),
        keep_alive_step: 0.5,
    }
}

/// A coordinator wired to a store and scripted providers.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub copy: Arc<ScriptedCopy>,
    pub images: Arc<ScriptedImages>,
    pub coordinator: Arc<GenerationCoordinator>,
}

impl TestHarness {
    pub fn new(collection: Collection) -> Self {
        Self::with(collection, ScriptedCopy::new(), ScriptedImages::new(), 7, 10)
    }

    pub fn with(
        collection: Collection,
        copy: ScriptedCopy,
        images: ScriptedImages,
        batch_size: usize,
        image_window: usize,
    ) -> Self {
        let store = Arc::new(MemoryStore::with_collection(collection));
        let copy = Arc::new(copy.observing(store.clone()));
        let images = Arc::new(images);
        let text: Arc<dyn TextGenerator> = Arc::new(BatchingTextGenerator::new(
            SharedCopy(copy.clone()),
            batch_size,
        ));
        let coordinator = build_coordinator(
            store.clone(),
            text,
            images.clone(),
            quiet_config(batch_size, image_window),
        );
        Self {
            store,
            copy,
            images,
            coordinator,
        }
    }

    pub async fn run(&self, job: JobDescriptor) -> Vec<ProgressEvent> {
        collect(self.coordinator.run(job)).await
    }

    pub async fn submit(&self, request: JobRequest) -> Vec<ProgressEvent> {
        collect(self.coordinator.submit(request)).await
    }

    pub fn stored(&self, collection_id: &str) -> Collection {
        self.store.snapshot(collection_id).unwrap()
    }
}

pub fn build_coordinator(
    store: Arc<dyn ContentStore>,
    text: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageGenerator>,
    config: CoordinatorConfig,
) -> Arc<GenerationCoordinator> {
    Arc::new(
        GenerationCoordinator::new(config, store.clone(), text, images)
            .with_access(Arc::new(StoreAccessControl::new(store))),
    )
}

/// Drains a job's stream until the coordinator drops its sender.
pub async fn collect(
    mut receiver: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>,
) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[ProgressEvent]) -> Vec<EventType> {
    events.iter().map(|e| e.event_type).collect()
}

pub fn count(events: &[ProgressEvent], kind: EventType) -> usize {
    events.iter().filter(|e| e.event_type == kind).count()
}

pub fn phase_completes(events: &[ProgressEvent], phase: JobPhase) -> usize {
    events
        .iter()
        .filter(|e| e.event_type == EventType::PhaseComplete && e.phase == phase)
        .count()
}

/// Exactly one terminal event, and it is the last one.
pub fn assert_single_terminal(events: &[ProgressEvent]) {
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1, "events: {:?}", kinds(events));
    assert!(events.last().unwrap().is_terminal());
}

/// Progress never decreases within a phase and stays in [0, 100].
pub fn assert_monotonic(events: &[ProgressEvent]) {
    let mut current: Option<(JobPhase, u8)> = None;
    for event in events {
        assert!(event.progress <= 100);
        if let Some((phase, last)) = current {
            if phase == event.phase {
                assert!(
                    event.progress >= last,
                    "{:?} progress went from {} to {} ({})",
                    phase,
                    last,
                    event.progress,
                    event.message
                );
            }
        }
        current = Some((event.phase, event.progress));
    }
}
