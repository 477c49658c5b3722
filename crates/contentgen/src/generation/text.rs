//! Ad copy generation, batched by day.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{ProviderError, TextGenerationError};
use crate::error::StoreError;
use crate::model::{BlockUpdate, Day};

/// A day the text phase generates copy for.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDay {
    /// Index into `Collection::days`.
    pub day_index: usize,
    pub day: Day,
    /// Blocks of `day` to write, 0-based.
    pub block_indices: Vec<usize>,
}

/// Input of a text generation run.
#[derive(Debug, Clone, Default)]
pub struct TextContext {
    pub collection_id: String,
    pub collection_name: String,
    pub days: Vec<TargetDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBlock {
    pub block_index: usize,
    pub update: BlockUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDay {
    pub day_index: usize,
    pub blocks: Vec<GeneratedBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub days: Vec<GeneratedDay>,
}

/// One completed batch, as handed to the [`BatchSink`].
#[derive(Debug, Clone)]
pub struct GeneratedBatch {
    /// 1-based.
    pub batch_number: usize,
    pub total_batches: usize,
    pub days: Vec<GeneratedDay>,
    /// Days completed so far, including this batch.
    pub processed_days: usize,
    pub total_days: usize,
}

/// Receives each batch as soon as it is generated. The generator does not
/// start the next batch until `on_batch` returns.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn on_batch(&self, batch: &GeneratedBatch) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &TextContext,
        on_batch: &dyn BatchSink,
    ) -> Result<GeneratedContent, TextGenerationError>;
}

/// Generates copy for one batch of days.
#[async_trait]
pub trait CopyProvider: Send + Sync {
    async fn generate_batch(
        &self,
        context: &TextContext,
        days: &[TargetDay],
    ) -> Result<Vec<GeneratedDay>, ProviderError>;
}

/// [`TextGenerator`] that splits the target days into fixed-size batches
/// and asks a [`CopyProvider`] for each in turn.
pub struct BatchingTextGenerator<P> {
    provider: P,
    batch_size: usize,
}

impl<P: CopyProvider> BatchingTextGenerator<P> {
    pub fn new(provider: P, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl<P: CopyProvider> TextGenerator for BatchingTextGenerator<P> {
    async fn generate(
        &self,
        context: &TextContext,
        on_batch: &dyn BatchSink,
    ) -> Result<GeneratedContent, TextGenerationError> {
        let total_days = context.days.len();
        let total_batches = total_days.div_ceil(self.batch_size);
        let mut content = GeneratedContent::default();
        let mut processed_days = 0;

        for (i, chunk) in context.days.chunks(self.batch_size).enumerate() {
            let batch_number = i + 1;
            log::debug!(
                "Generating copy batch {}/{} ({} days) for collection {}",
                batch_number,
                total_batches,
                chunk.len(),
                context.collection_id
            );

            let days = match self.provider.generate_batch(context, chunk).await {
                Ok(days) => days,
                Err(e) if processed_days == 0 => return Err(TextGenerationError::Failed(e)),
                Err(e) => {
                    return Err(TextGenerationError::Partial {
                        processed_days,
                        total_days,
                        partial_content: content,
                        reason: e.to_string(),
                    })
                }
            };

            processed_days += chunk.len();
            let batch = GeneratedBatch {
                batch_number,
                total_batches,
                days,
                processed_days,
                total_days,
            };
            on_batch
                .on_batch(&batch)
                .await
                .map_err(TextGenerationError::Persist)?;
            content.days.extend(batch.days);
        }

        Ok(content)
    }
}
