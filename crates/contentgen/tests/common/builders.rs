//! Builders for collections and scripted collaborators.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use contentgen::generation::{
    BatchSink, CopyProvider, GeneratedBlock, GeneratedContent, GeneratedDay, ImageContext,
    ImageGenerationError, ImageGenerator, ProviderError, TargetDay, TextContext,
    TextGenerationError, TextGenerator,
};
use contentgen::model::{BlockUpdate, Collection, ContentBlock, Day};
use contentgen::MemoryStore;

/// Builds a collection of `days` days with `blocks` blocks each.
pub struct CollectionBuilder {
    collection: Collection,
}

impl CollectionBuilder {
    pub fn new(id: &str, owner_id: &str) -> Self {
        let mut collection = Collection::new(id, owner_id);
        collection.name = "Spring launch".to_string();
        Self { collection }
    }

    pub fn days(mut self, days: u32, blocks: usize) -> Self {
        let id = self.collection.id.clone();
        for position in 1..=days {
            let date = NaiveDate::from_ymd_opt(2026, 5, position).unwrap();
            let mut day = Day::new(position, date);
            for b in 0..blocks {
                let mut block = ContentBlock::new(&format!("{id}-d{position}b{b}"), "post");
                block.key_message = format!("Message {position}");
                block.tone_of_voice = "playful".to_string();
                day.blocks.push(block);
            }
            self.collection.days.push(day);
        }
        self
    }

    /// Gives every block copy and a prompt, so only images are missing.
    pub fn with_copy(mut self) -> Self {
        for day in &mut self.collection.days {
            for (b, block) in day.blocks.iter_mut().enumerate() {
                block.ad_copy = Some(format!("Existing copy {} {}", day.position, b));
                block.image_prompt = Some(format!("prompt {}-{}", day.position, b));
            }
        }
        self
    }

    /// Sets copy on a single block.
    pub fn copy_at(mut self, day_index: usize, block_index: usize, copy: &str) -> Self {
        self.collection.days[day_index].blocks[block_index].ad_copy = Some(copy.to_string());
        self
    }

    pub fn image_at(mut self, day_index: usize, block_index: usize, url: &str) -> Self {
        self.collection.days[day_index].blocks[block_index].image_url = Some(url.to_string());
        self
    }

    pub fn build(self) -> Collection {
        self.collection
    }
}

fn copy_for(day: &TargetDay, prefix: &str, padding: &str) -> GeneratedDay {
    GeneratedDay {
        day_index: day.day_index,
        blocks: day
            .block_indices
            .iter()
            .map(|b| GeneratedBlock {
                block_index: *b,
                update: BlockUpdate::text(
                    format!("{padding}{prefix} day {} block {}{padding}", day.day.position, b),
                    Some(format!("{padding}scene {}-{}{padding}", day.day.position, b)),
                ),
            })
            .collect(),
    }
}

/// Copy provider that answers every batch, optionally failing one of them.
///
/// Records the day positions of every call and, when given a store, how
/// many block writes had been persisted when each call started.
pub struct ScriptedCopy {
    fail_on_call: Option<usize>,
    empty_copy: bool,
    padding: &'static str,
    observed_store: Option<Arc<MemoryStore>>,
    pub calls: Mutex<Vec<Vec<u32>>>,
    pub writes_at_call: Mutex<Vec<usize>>,
}

impl ScriptedCopy {
    pub fn new() -> Self {
        Self {
            fail_on_call: None,
            empty_copy: false,
            padding: "",
            observed_store: None,
            calls: Mutex::new(Vec::new()),
            writes_at_call: Mutex::new(Vec::new()),
        }
    }

    /// Fails the given 1-based call.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Answers with blank copy and no prompt.
    pub fn blank(mut self) -> Self {
        self.empty_copy = true;
        self
    }

    /// Surrounds copy and prompts with whitespace, as chat models often do.
    pub fn padded(mut self) -> Self {
        self.padding = " \n";
        self
    }

    pub fn observing(mut self, store: Arc<MemoryStore>) -> Self {
        self.observed_store = Some(store);
        self
    }

    pub fn requested_days(&self) -> Vec<Vec<u32>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CopyProvider for ScriptedCopy {
    async fn generate_batch(
        &self,
        _context: &TextContext,
        days: &[TargetDay],
    ) -> Result<Vec<GeneratedDay>, ProviderError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(days.iter().map(|d| d.day.position).collect());
            calls.len()
        };
        if let Some(store) = &self.observed_store {
            self.writes_at_call.lock().unwrap().push(store.writes().len());
        }
        if self.fail_on_call == Some(call) {
            return Err(ProviderError::Rejected("model overloaded".to_string()));
        }
        if self.empty_copy {
            return Ok(days
                .iter()
                .map(|d| GeneratedDay {
                    day_index: d.day_index,
                    blocks: d
                        .block_indices
                        .iter()
                        .map(|b| GeneratedBlock {
                            block_index: *b,
                            update: BlockUpdate {
                                ad_copy: Some(String::new()),
                                image_prompt: None,
                                image_url: None,
                            },
                        })
                        .collect(),
                })
                .collect());
        }
        Ok(days
            .iter()
            .map(|d| copy_for(d, "Fresh", self.padding))
            .collect())
    }
}

/// Shares a [`ScriptedCopy`] between the test and a generator.
pub struct SharedCopy(pub Arc<ScriptedCopy>);

#[async_trait]
impl CopyProvider for SharedCopy {
    async fn generate_batch(
        &self,
        context: &TextContext,
        days: &[TargetDay],
    ) -> Result<Vec<GeneratedDay>, ProviderError> {
        self.0.generate_batch(context, days).await
    }
}

/// Text generator that reports a partial failure without ever calling the
/// batch sink, returning copy for the first `processed` days.
pub struct SilentPartialText {
    pub processed: usize,
}

#[async_trait]
impl TextGenerator for SilentPartialText {
    async fn generate(
        &self,
        context: &TextContext,
        _on_batch: &dyn BatchSink,
    ) -> Result<GeneratedContent, TextGenerationError> {
        let days = context
            .days
            .iter()
            .take(self.processed)
            .map(|d| copy_for(d, "Salvaged", ""))
            .collect();
        Err(TextGenerationError::Partial {
            processed_days: self.processed,
            total_days: context.days.len(),
            partial_content: GeneratedContent { days },
            reason: "connection reset".to_string(),
        })
    }
}

/// One call made to [`ScriptedImages`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCall {
    pub block_id: String,
    pub prompt: String,
    pub references: Vec<String>,
}

/// Image generator returning `https://img.test/{block_id}.png`, rejecting
/// chosen blocks and tracking concurrency.
pub struct ScriptedImages {
    rejected: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<ImageCall>>,
}

impl ScriptedImages {
    pub fn new() -> Self {
        Self {
            rejected: HashSet::new(),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(mut self, block_id: &str) -> Self {
        self.rejected.insert(block_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ImageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn url_for(block_id: &str) -> String {
        format!("https://img.test/{block_id}.png")
    }

    async fn produce(
        &self,
        prompt: &str,
        context: &ImageContext,
        references: &[String],
    ) -> Result<String, ImageGenerationError> {
        self.calls.lock().unwrap().push(ImageCall {
            block_id: context.block_id.clone(),
            prompt: prompt.to_string(),
            references: references.to_vec(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.rejected.contains(&context.block_id) {
            return Err(ImageGenerationError::Provider(ProviderError::Rejected(
                "content policy".to_string(),
            )));
        }
        Ok(Self::url_for(&context.block_id))
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImages {
    async fn generate_image(
        &self,
        prompt: &str,
        context: &ImageContext,
    ) -> Result<String, ImageGenerationError> {
        self.produce(prompt, context, &[]).await
    }

    async fn generate_consistent_image(
        &self,
        prompt: &str,
        context: &ImageContext,
        prior_references: &[String],
    ) -> Result<String, ImageGenerationError> {
        self.produce(prompt, context, prior_references).await
    }
}
