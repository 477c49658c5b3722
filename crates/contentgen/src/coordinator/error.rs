use thiserror::Error;

use crate::error::{AccessError, InputError, StoreError};
use crate::generation::TextGenerationError;

/// Conditions that end a generation job with an `error` event.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid request: {0}")]
    Input(#[from] InputError),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Text(#[from] TextGenerationError),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),
}
