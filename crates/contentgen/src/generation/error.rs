use thiserror::Error;

use super::text::GeneratedContent;
use crate::error::{StorageError, StoreError};

/// A generation backend call failed.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum TextGenerationError {
    /// Some batches completed before the failure. Their content has already
    /// been handed to the batch sink.
    #[error("Generated {processed_days} of {total_days} days before failing: {reason}")]
    Partial {
        processed_days: usize,
        total_days: usize,
        partial_content: GeneratedContent,
        reason: String,
    },

    #[error("Text generation failed: {0}")]
    Failed(#[source] ProviderError),

    #[error("Failed to persist generated batch: {0}")]
    Persist(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum ImageGenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to store image: {0}")]
    Storage(#[from] StorageError),

    #[error("Image prompt is empty")]
    EmptyPrompt,
}
