//! Job descriptors and scope filtering.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::collection::Collection;
use crate::error::InputError;

/// Which generation phases a job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Text,
    Images,
    #[default]
    All,
}

impl GenerationMode {
    pub fn includes_text(self) -> bool {
        matches!(self, GenerationMode::Text | GenerationMode::All)
    }

    pub fn includes_images(self) -> bool {
        matches!(self, GenerationMode::Images | GenerationMode::All)
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationMode::Text => write!(f, "text"),
            GenerationMode::Images => write!(f, "images"),
            GenerationMode::All => write!(f, "all"),
        }
    }
}

/// Addresses one block: `day` is the 1-based day position, `block` the
/// 0-based index within that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockRef {
    pub day: u32,
    pub block: usize,
}

/// Restricts a job to a subset of days and/or blocks. Both lists narrow the
/// working set; an absent list does not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockRef>>,
}

impl ScopeFilter {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.days.iter().flatten().any(|d| *d == 0) {
            return Err(InputError::InvalidScope(
                "day positions are 1-based".to_string(),
            ));
        }
        if self.blocks.iter().flatten().any(|b| b.day == 0) {
            return Err(InputError::InvalidScope(
                "block references use 1-based day positions".to_string(),
            ));
        }
        Ok(())
    }

    fn admits(&self, day_position: u32, block_index: usize) -> bool {
        let day_ok = self
            .days
            .as_ref()
            .is_none_or(|days| days.contains(&day_position));
        let block_ok = self.blocks.as_ref().is_none_or(|blocks| {
            blocks.contains(&BlockRef {
                day: day_position,
                block: block_index,
            })
        });
        day_ok && block_ok
    }
}

/// The blocks a job operates on, as (day index, block index) pairs into
/// `Collection::days`. Ordered by day then block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    pub blocks: BTreeSet<(usize, usize)>,
}

impl WorkingSet {
    pub fn resolve(collection: &Collection, scope: Option<&ScopeFilter>) -> Self {
        let mut blocks = BTreeSet::new();
        for (day_index, day) in collection.days.iter().enumerate() {
            for block_index in 0..day.blocks.len() {
                if scope.is_none_or(|s| s.admits(day.position, block_index)) {
                    blocks.insert((day_index, block_index));
                }
            }
        }
        Self { blocks }
    }

    pub fn contains(&self, day_index: usize, block_index: usize) -> bool {
        self.blocks.contains(&(day_index, block_index))
    }

    /// Day indices that have at least one block in scope, in order.
    pub fn day_indices(&self) -> Vec<usize> {
        let mut days: Vec<usize> = self.blocks.iter().map(|(d, _)| *d).collect();
        days.dedup();
        days
    }

    pub fn blocks_of(&self, day_index: usize) -> Vec<usize> {
        self.blocks
            .range((day_index, 0)..(day_index + 1, 0))
            .map(|(_, b)| *b)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// A validated, immutable generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub job_id: String,
    pub collection_id: String,
    pub owner_id: String,
    pub mode: GenerationMode,
    pub scope: Option<ScopeFilter>,
    /// Generate images one at a time, each referencing the previous one.
    pub consistency: bool,
    /// Regenerate text for days that are already complete.
    pub overwrite: bool,
}

impl JobDescriptor {
    pub fn new(collection_id: &str, owner_id: &str, mode: GenerationMode) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            collection_id: collection_id.to_string(),
            owner_id: owner_id.to_string(),
            mode,
            scope: None,
            consistency: false,
            overwrite: false,
        }
    }

    pub fn with_scope(mut self, scope: ScopeFilter) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_consistency(mut self, consistency: bool) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// The stream request body. Identifiers are optional here so that a missing
/// one can be reported as an event instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub scope: Option<ScopeFilter>,
    #[serde(default)]
    pub consistency: bool,
    #[serde(default)]
    pub overwrite: bool,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, InputError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(InputError::MissingField(field)),
    }
}

impl JobRequest {
    pub fn into_descriptor(self) -> Result<JobDescriptor, InputError> {
        let collection_id = required(self.collection_id, "collectionId")?;
        let owner_id = required(self.owner_id, "ownerId")?;
        if let Some(scope) = &self.scope {
            scope.validate()?;
        }
        let mut job = JobDescriptor::new(&collection_id, &owner_id, self.mode)
            .with_consistency(self.consistency)
            .with_overwrite(self.overwrite);
        job.scope = self.scope;
        Ok(job)
    }
}
