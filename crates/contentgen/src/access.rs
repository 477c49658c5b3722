//! Write authorization for collections.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AccessError;
use crate::store::ContentStore;

#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Fails unless `owner_id` may write `collection_id`.
    async fn require_access(&self, owner_id: &str, collection_id: &str) -> Result<(), AccessError>;
}

/// Grants access to the owner recorded on the collection.
pub struct StoreAccessControl {
    store: Arc<dyn ContentStore>,
}

impl StoreAccessControl {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccessControl for StoreAccessControl {
    async fn require_access(&self, owner_id: &str, collection_id: &str) -> Result<(), AccessError> {
        match self.store.collection_owner(collection_id).await? {
            None => Err(AccessError::CollectionNotFound(collection_id.to_string())),
            Some(owner) if owner == owner_id => Ok(()),
            Some(_) => {
                tracing::warn!(owner_id, collection_id, "Write access denied");
                Err(AccessError::Denied {
                    owner_id: owner_id.to_string(),
                    collection_id: collection_id.to_string(),
                })
            }
        }
    }
}

/// Grants every request. For single-tenant deployments and tests.
pub struct AllowAll;

#[async_trait]
impl AccessControl for AllowAll {
    async fn require_access(&self, _owner_id: &str, _collection_id: &str) -> Result<(), AccessError> {
        Ok(())
    }
}
