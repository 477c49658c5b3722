//! Durable storage of the Day / Content Block tree.

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{BlockUpdate, Collection};

pub use memory::{MemoryStore, RecordedWrite};
pub use sqlite::SqliteStore;

/// Read and write access to collections.
///
/// `day_index` and `block_index` are 0-based indices into
/// `Collection::days` and `Day::blocks` as returned by `load_tree`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Loads the full tree, or `None` when the collection does not exist.
    async fn load_tree(&self, collection_id: &str) -> Result<Option<Collection>, StoreError>;

    /// Writes generated fields to one block. Blank fields in `update` leave
    /// the stored value untouched.
    async fn update_block(
        &self,
        collection_id: &str,
        day_index: usize,
        block_index: usize,
        update: &BlockUpdate,
    ) -> Result<(), StoreError>;

    /// Sets the collection's generated flag and update timestamp.
    async fn mark_generated(&self, collection_id: &str) -> Result<(), StoreError>;

    async fn collection_owner(&self, collection_id: &str) -> Result<Option<String>, StoreError>;
}
