use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{IndexError, IndexResult};
use crate::models::IndexDescriptor;

/// Persistence of the per-owner descriptor.
///
/// Implementations fail with `OwnerNotFound` for owners without a configuration row,
/// and store `None` as "no index yet".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn load(&self, owner_id: Uuid) -> IndexResult<Option<IndexDescriptor>>;

    async fn save(&self, owner_id: Uuid, descriptor: Option<IndexDescriptor>) -> IndexResult<()>;
}

/// In-memory descriptor store for development and tests
#[derive(Default)]
pub struct InMemoryDescriptorStore {
    owners: RwLock<HashMap<Uuid, Option<IndexDescriptor>>>,
}

impl InMemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner without an index
    pub async fn add_owner(&self, owner_id: Uuid) {
        self.owners.write().await.entry(owner_id).or_insert(None);
    }

    pub async fn add_owner_with(&self, owner_id: Uuid, descriptor: IndexDescriptor) {
        self.owners.write().await.insert(owner_id, Some(descriptor));
    }
}

#[async_trait]
impl DescriptorStore for InMemoryDescriptorStore {
    async fn load(&self, owner_id: Uuid) -> IndexResult<Option<IndexDescriptor>> {
        self.owners
            .read()
            .await
            .get(&owner_id)
            .cloned()
            .ok_or(IndexError::OwnerNotFound(owner_id))
    }

    async fn save(&self, owner_id: Uuid, descriptor: Option<IndexDescriptor>) -> IndexResult<()> {
        let mut owners = self.owners.write().await;
        let slot = owners
            .get_mut(&owner_id)
            .ok_or(IndexError::OwnerNotFound(owner_id))?;
        *slot = descriptor;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendKind;

    #[tokio::test]
    async fn test_unknown_owner() {
        let store = InMemoryDescriptorStore::new();
        let owner = Uuid::new_v4();

        assert!(matches!(
            store.load(owner).await,
            Err(IndexError::OwnerNotFound(id)) if id == owner
        ));
        assert!(store.save(owner, None).await.is_err());
    }

    #[tokio::test]
    async fn test_save_and_clear() {
        let store = InMemoryDescriptorStore::new();
        let owner = Uuid::new_v4();
        store.add_owner(owner).await;
        assert_eq!(store.load(owner).await.unwrap(), None);

        let descriptor = IndexDescriptor::for_owner(BackendKind::Weaviate, owner);
        store.save(owner, Some(descriptor.clone())).await.unwrap();
        assert_eq!(store.load(owner).await.unwrap(), Some(descriptor));

        store.save(owner, None).await.unwrap();
        assert_eq!(store.load(owner).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_owner_keeps_existing_descriptor() {
        let store = InMemoryDescriptorStore::new();
        let owner = Uuid::new_v4();
        let descriptor = IndexDescriptor::for_owner(BackendKind::Milvus, owner);
        store.add_owner_with(owner, descriptor.clone()).await;

        store.add_owner(owner).await;

        assert_eq!(store.load(owner).await.unwrap(), Some(descriptor));
    }
}
