//! OpenAI-compatible HTTP providers.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::{ImageGenerationError, ProviderError};
use super::image::{ImageContext, ImageGenerator};
use super::text::{CopyProvider, GeneratedBlock, GeneratedDay, TargetDay, TextContext};
use crate::model::BlockUpdate;
use crate::storage::ObjectStorage;

static RE_JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

const COPY_SYSTEM_PROMPT: &str = "You write social media ad copy. For every block you are given, \
write the ad copy and a one-sentence image prompt describing a matching visual. \
Respond with JSON only, shaped as \
{\"days\":[{\"position\":1,\"blocks\":[{\"index\":0,\"adCopy\":\"...\",\"imagePrompt\":\"...\"}]}]}.";

/// Connection settings shared by both providers.
#[derive(Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout: Duration,
}

impl ProviderEndpoint {
    fn client(&self) -> Result<Client, ProviderError> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

async fn post_json<T: for<'de> Deserialize<'de>>(
    client: &Client,
    endpoint: &ProviderEndpoint,
    path: &str,
    body: &serde_json::Value,
) -> Result<T, ProviderError> {
    let response = client
        .post(endpoint.url(path))
        .bearer_auth(endpoint.api_key.expose_secret())
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: crate::sanitize::truncate(&body, 500),
        });
    }
    Ok(response.json::<T>().await?)
}

// ─── Copy ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptDay<'a> {
    position: u32,
    date: String,
    blocks: Vec<PromptBlock<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptBlock<'a> {
    index: usize,
    content_type: &'a str,
    key_message: &'a str,
    tone_of_voice: &'a str,
    scheduled_time: &'a str,
}

#[derive(Deserialize)]
struct CopyResponse {
    days: Vec<CopyDay>,
}

#[derive(Deserialize)]
struct CopyDay {
    position: u32,
    #[serde(default)]
    blocks: Vec<CopyBlock>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CopyBlock {
    index: usize,
    ad_copy: String,
    #[serde(default)]
    image_prompt: Option<String>,
}

/// Generates a batch of ad copy with one chat completion call.
pub struct HttpCopyProvider {
    client: Client,
    endpoint: ProviderEndpoint,
}

impl HttpCopyProvider {
    pub fn new(endpoint: ProviderEndpoint) -> Result<Self, ProviderError> {
        Ok(Self {
            client: endpoint.client()?,
            endpoint,
        })
    }
}

fn build_copy_prompt(context: &TextContext, days: &[TargetDay]) -> Result<String, ProviderError> {
    let prompt_days: Vec<PromptDay<'_>> = days
        .iter()
        .map(|target| PromptDay {
            position: target.day.position,
            date: target.day.date.to_string(),
            blocks: target
                .block_indices
                .iter()
                .filter_map(|i| target.day.blocks.get(*i).map(|b| (*i, b)))
                .map(|(index, block)| PromptBlock {
                    index,
                    content_type: &block.content_type,
                    key_message: &block.key_message,
                    tone_of_voice: &block.tone_of_voice,
                    scheduled_time: &block.scheduled_time,
                })
                .collect(),
        })
        .collect();
    let days_json = serde_json::to_string(&prompt_days)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(format!(
        "Campaign: {}\nDays:\n{}",
        context.collection_name, days_json
    ))
}

/// Maps the model's answer back onto the batch. Blocks the batch did not ask
/// for are dropped.
fn parse_copy_response(content: &str, days: &[TargetDay]) -> Result<Vec<GeneratedDay>, ProviderError> {
    let json = RE_JSON_OBJECT
        .find(content)
        .ok_or_else(|| ProviderError::InvalidResponse("no JSON object in response".to_string()))?;
    let response: CopyResponse = serde_json::from_str(json.as_str())
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let mut generated = Vec::new();
    for target in days {
        let Some(answer) = response.days.iter().find(|d| d.position == target.day.position) else {
            log::warn!("Response is missing day {}", target.day.position);
            continue;
        };
        let blocks: Vec<GeneratedBlock> = answer
            .blocks
            .iter()
            .filter(|b| target.block_indices.contains(&b.index))
            .filter(|b| !b.ad_copy.trim().is_empty())
            .map(|b| GeneratedBlock {
                block_index: b.index,
                update: BlockUpdate::text(b.ad_copy.trim(), b.image_prompt.clone()),
            })
            .collect();
        generated.push(GeneratedDay {
            day_index: target.day_index,
            blocks,
        });
    }

    if generated.is_empty() && !days.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "response contains none of the requested days".to_string(),
        ));
    }
    Ok(generated)
}

#[async_trait]
impl CopyProvider for HttpCopyProvider {
    async fn generate_batch(
        &self,
        context: &TextContext,
        days: &[TargetDay],
    ) -> Result<Vec<GeneratedDay>, ProviderError> {
        let body = json!({
            "model": self.endpoint.model,
            "messages": [
                { "role": "system", "content": COPY_SYSTEM_PROMPT },
                { "role": "user", "content": build_copy_prompt(context, days)? },
            ],
            "response_format": { "type": "json_object" },
        });

        let response: ChatCompletionResponse =
            post_json(&self.client, &self.endpoint, "chat/completions", &body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("empty completion".to_string()))?;

        parse_copy_response(&content, days)
    }
}

// ─── Images ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Generates images and uploads them through [`ObjectStorage`].
pub struct HttpImageGenerator {
    client: Client,
    endpoint: ProviderEndpoint,
    size: String,
    storage: Arc<dyn ObjectStorage>,
}

impl HttpImageGenerator {
    pub fn new(
        endpoint: ProviderEndpoint,
        size: &str,
        storage: Arc<dyn ObjectStorage>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: endpoint.client()?,
            endpoint,
            size: size.to_string(),
            storage,
        })
    }

    async fn request(&self, prompt: &str, context: &ImageContext) -> Result<String, ImageGenerationError> {
        let body = json!({
            "model": self.endpoint.model,
            "prompt": prompt,
            "size": self.size,
            "n": 1,
            "response_format": "b64_json",
        });
        let response: ImageResponse =
            post_json(&self.client, &self.endpoint, "images/generations", &body).await?;
        let image = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no image returned".to_string()))?;

        match (image.b64_json, image.url) {
            (Some(b64), _) => {
                let data_uri = format!("data:image/png;base64,{}", b64);
                let destination = format!("{}/images/{}", context.collection_id, context.block_id);
                Ok(self.storage.upload_data_uri(&data_uri, &destination).await?)
            }
            (None, Some(url)) => Ok(url),
            (None, None) => {
                Err(ProviderError::InvalidResponse("image has neither data nor url".to_string()).into())
            }
        }
    }
}

fn styled_prompt(prompt: &str, context: &ImageContext) -> String {
    let mut full = prompt.trim().to_string();
    if !context.tone_of_voice.is_empty() {
        full.push_str(&format!(" Mood: {}.", context.tone_of_voice));
    }
    full
}

fn consistent_prompt(prompt: &str, context: &ImageContext, prior_references: &[String]) -> String {
    let mut full = styled_prompt(prompt, context);
    if let Some(previous) = prior_references.last() {
        full.push_str(&format!(
            " Keep characters, palette and setting consistent with the previous scene ({}).",
            previous
        ));
    }
    full
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate_image(&self, prompt: &str, context: &ImageContext) -> Result<String, ImageGenerationError> {
        if prompt.trim().is_empty() {
            return Err(ImageGenerationError::EmptyPrompt);
        }
        self.request(&styled_prompt(prompt, context), context).await
    }

    async fn generate_consistent_image(
        &self,
        prompt: &str,
        context: &ImageContext,
        prior_references: &[String],
    ) -> Result<String, ImageGenerationError> {
        if prompt.trim().is_empty() {
            return Err(ImageGenerationError::EmptyPrompt);
        }
        self.request(&consistent_prompt(prompt, context, prior_references), context)
            .await
    }
}
