//! Generation collaborators: ad copy in batches of days, images per block.

pub mod error;
pub mod http;
pub mod image;
pub mod text;

pub use error::{ImageGenerationError, ProviderError, TextGenerationError};
pub use http::{HttpCopyProvider, HttpImageGenerator, ProviderEndpoint};
pub use image::{ImageContext, ImageGenerator};
pub use text::{
    BatchSink, BatchingTextGenerator, CopyProvider, GeneratedBatch, GeneratedBlock,
    GeneratedContent, GeneratedDay, TargetDay, TextContext, TextGenerator,
};
