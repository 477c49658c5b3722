//! The Day / Content Block tree a generation job mutates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tenant-scoped collection of days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    /// Set once a generation job has completed its save phase.
    #[serde(default)]
    pub content_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days: Vec<Day>,
}

impl Collection {
    pub fn new(id: &str, owner_id: &str) -> Self {
        Self {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: String::new(),
            content_generated: false,
            updated_at: None,
            days: Vec::new(),
        }
    }

    pub fn block(&self, day_index: usize, block_index: usize) -> Option<&ContentBlock> {
        self.days.get(day_index)?.blocks.get(block_index)
    }

    pub fn block_mut(&mut self, day_index: usize, block_index: usize) -> Option<&mut ContentBlock> {
        self.days.get_mut(day_index)?.blocks.get_mut(block_index)
    }

    /// Applies `update` to the addressed block. Returns false when the block does not exist.
    pub fn apply_update(&mut self, day_index: usize, block_index: usize, update: &BlockUpdate) -> bool {
        match self.block_mut(day_index, block_index) {
            Some(block) => {
                block.merge_generated(update);
                true
            }
            None => false,
        }
    }
}

/// One calendar day of a collection, 1-indexed by `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    pub position: u32,
    pub date: NaiveDate,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

impl Day {
    pub fn new(position: u32, date: NaiveDate) -> Self {
        Self {
            position,
            date,
            blocks: Vec::new(),
        }
    }

    pub fn is_text_complete(&self) -> bool {
        self.blocks.iter().all(ContentBlock::has_text)
    }
}

/// Smallest unit of generated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub id: String,
    pub content_type: String,
    #[serde(default)]
    pub ad_copy: Option<String>,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub key_message: String,
    #[serde(default)]
    pub tone_of_voice: String,
    #[serde(default)]
    pub scheduled_time: String,
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ContentBlock {
    pub fn new(id: &str, content_type: &str) -> Self {
        Self {
            id: id.to_string(),
            content_type: content_type.to_string(),
            ad_copy: None,
            image_prompt: None,
            image_url: None,
            key_message: String::new(),
            tone_of_voice: String::new(),
            scheduled_time: String::new(),
        }
    }

    pub fn has_text(&self) -> bool {
        filled(&self.ad_copy)
    }

    pub fn has_image(&self) -> bool {
        filled(&self.image_url)
    }

    pub fn has_prompt(&self) -> bool {
        filled(&self.image_prompt)
    }

    /// A block is an image target when it has a prompt but no image yet.
    pub fn needs_image(&self) -> bool {
        self.has_prompt() && !self.has_image()
    }

    /// Merges generated fields into this block, trimmed the same way the
    /// SQLite store trims them. Empty incoming values never clear a field
    /// that is already filled.
    pub fn merge_generated(&mut self, update: &BlockUpdate) {
        if let Some(v) = trimmed(&update.ad_copy) {
            self.ad_copy = Some(v);
        }
        if let Some(v) = trimmed(&update.image_prompt) {
            self.image_prompt = Some(v);
        }
        if let Some(v) = trimmed(&update.image_url) {
            self.image_url = Some(v);
        }
    }

    /// The generated fields of this block, as an update.
    pub fn generated_fields(&self) -> BlockUpdate {
        BlockUpdate {
            ad_copy: self.ad_copy.clone(),
            image_prompt: self.image_prompt.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// Generated fields written to a single block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_copy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl BlockUpdate {
    pub fn text(ad_copy: impl Into<String>, image_prompt: Option<String>) -> Self {
        Self {
            ad_copy: Some(ad_copy.into()),
            image_prompt,
            image_url: None,
        }
    }

    pub fn image(image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !filled(&self.ad_copy) && !filled(&self.image_prompt) && !filled(&self.image_url)
    }
}
