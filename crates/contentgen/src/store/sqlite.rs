use async_trait::async_trait;
use chrono::Utc;

use super::ContentStore;
use crate::db::{collection_repo, Database, DatabaseError};
use crate::error::StoreError;
use crate::model::{BlockUpdate, Collection};

/// [`ContentStore`] over the SQLite database. Each call runs on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn load_tree(&self, collection_id: &str) -> Result<Option<Collection>, StoreError> {
        let id = collection_id.to_string();
        self.blocking(move |db| collection_repo::load(db, &id)).await
    }

    async fn update_block(
        &self,
        collection_id: &str,
        day_index: usize,
        block_index: usize,
        update: &BlockUpdate,
    ) -> Result<(), StoreError> {
        let id = collection_id.to_string();
        let update = update.clone();
        let found = self
            .blocking(move |db| collection_repo::update_block(db, &id, day_index, block_index, &update))
            .await?;
        if !found {
            return Err(StoreError::BlockNotFound {
                collection_id: collection_id.to_string(),
                day_index,
                block_index,
            });
        }
        Ok(())
    }

    async fn mark_generated(&self, collection_id: &str) -> Result<(), StoreError> {
        let id = collection_id.to_string();
        let found = self
            .blocking(move |db| collection_repo::mark_generated(db, &id, Utc::now()))
            .await?;
        if !found {
            return Err(StoreError::CollectionNotFound(collection_id.to_string()));
        }
        Ok(())
    }

    async fn collection_owner(&self, collection_id: &str) -> Result<Option<String>, StoreError> {
        let id = collection_id.to_string();
        self.blocking(move |db| collection_repo::owner(db, &id)).await
    }
}
