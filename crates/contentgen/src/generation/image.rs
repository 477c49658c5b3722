use async_trait::async_trait;

use super::error::ImageGenerationError;

/// What an image is for. Providers use it to name and describe the output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageContext {
    pub collection_id: String,
    pub block_id: String,
    pub content_type: String,
    pub key_message: String,
    pub tone_of_voice: String,
}

/// Produces an image for a prompt and returns its URL.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        context: &ImageContext,
    ) -> Result<String, ImageGenerationError>;

    /// Like [`Self::generate_image`], keeping the style of the images at
    /// `prior_references` (most recent last).
    async fn generate_consistent_image(
        &self,
        prompt: &str,
        context: &ImageContext,
        prior_references: &[String],
    ) -> Result<String, ImageGenerationError>;
}
