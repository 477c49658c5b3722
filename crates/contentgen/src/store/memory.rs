use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::ContentStore;
use crate::error::StoreError;
use crate::model::{BlockUpdate, Collection};

/// A block write as recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub collection_id: String,
    pub day_index: usize,
    pub block_index: usize,
    pub update: BlockUpdate,
}

/// In-process store. Records every block write in order and can be told to
/// fail writes for chosen blocks.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    writes: Mutex<Vec<RecordedWrite>>,
    failing_blocks: Mutex<HashSet<(usize, usize)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(collection: Collection) -> Self {
        let store = Self::new();
        store.insert(collection);
        store
    }

    pub fn insert(&self, collection: Collection) {
        lock(&self.collections).insert(collection.id.clone(), collection);
    }

    /// Current stored state of a collection.
    pub fn snapshot(&self, collection_id: &str) -> Option<Collection> {
        lock(&self.collections).get(collection_id).cloned()
    }

    /// Block writes in the order they were applied.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        lock(&self.writes).clone()
    }

    /// Makes every later write to the given block fail.
    pub fn fail_writes_to(&self, day_index: usize, block_index: usize) {
        lock(&self.failing_blocks).insert((day_index, block_index));
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn load_tree(&self, collection_id: &str) -> Result<Option<Collection>, StoreError> {
        Ok(self.snapshot(collection_id))
    }

    async fn update_block(
        &self,
        collection_id: &str,
        day_index: usize,
        block_index: usize,
        update: &BlockUpdate,
    ) -> Result<(), StoreError> {
        let not_found = || StoreError::BlockNotFound {
            collection_id: collection_id.to_string(),
            day_index,
            block_index,
        };
        if lock(&self.failing_blocks).contains(&(day_index, block_index)) {
            return Err(StoreError::Task(format!(
                "write to block {}/{} rejected",
                day_index, block_index
            )));
        }

        let mut collections = lock(&self.collections);
        let collection = collections
            .get_mut(collection_id)
            .ok_or_else(|| StoreError::CollectionNotFound(collection_id.to_string()))?;
        if !collection.apply_update(day_index, block_index, update) {
            return Err(not_found());
        }
        lock(&self.writes).push(RecordedWrite {
            collection_id: collection_id.to_string(),
            day_index,
            block_index,
            update: update.clone(),
        });
        Ok(())
    }

    async fn mark_generated(&self, collection_id: &str) -> Result<(), StoreError> {
        let mut collections = lock(&self.collections);
        let collection = collections
            .get_mut(collection_id)
            .ok_or_else(|| StoreError::CollectionNotFound(collection_id.to_string()))?;
        collection.content_generated = true;
        collection.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn collection_owner(&self, collection_id: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.collections)
            .get(collection_id)
            .map(|c| c.owner_id.clone()))
    }
}
