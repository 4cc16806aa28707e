use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{DbError, DbResult};
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::EntityId;

/// Deadline decorator for any object store.
///
/// The upstream store exposes synchronous-looking calls with no timeout of
/// their own; this wrapper bounds each call and surfaces an elapsed deadline
/// as `DbError::Timeout`, which propagates to the caller instead of being
/// silently served as empty data.
pub struct TimeoutStore {
    inner: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = DbResult<T>> + Send,
    ) -> DbResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                log::error!("Object store call exceeded {} ms deadline", ms);
                Err(DbError::Timeout(ms))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for TimeoutStore {
    async fn get(&self, entity_type: EntityType, id: EntityId) -> DbResult<Option<FieldMap>> {
        self.bounded(self.inner.get(entity_type, id)).await
    }

    async fn find(&self, entity_type: EntityType, filters: &[Filter]) -> DbResult<Vec<EntityId>> {
        self.bounded(self.inner.find(entity_type, filters)).await
    }

    async fn create(&self, entity_type: EntityType, fields: FieldMap) -> DbResult<EntityId> {
        self.bounded(self.inner.create(entity_type, fields)).await
    }

    async fn set_field(
        &self,
        entity_type: EntityType,
        id: EntityId,
        field: &str,
        value: Value,
    ) -> DbResult<()> {
        self.bounded(self.inner.set_field(entity_type, id, field, value)).await
    }

    async fn delete(&self, entity_type: EntityType, id: EntityId) -> DbResult<()> {
        self.bounded(self.inner.delete(entity_type, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    /// Store that never answers, for exercising the deadline path.
    struct StalledStore;

    #[async_trait]
    impl ObjectStore for StalledStore {
        async fn get(&self, _: EntityType, _: EntityId) -> DbResult<Option<FieldMap>> {
            std::future::pending().await
        }

        async fn find(&self, _: EntityType, _: &[Filter]) -> DbResult<Vec<EntityId>> {
            std::future::pending().await
        }

        async fn create(&self, _: EntityType, _: FieldMap) -> DbResult<EntityId> {
            std::future::pending().await
        }

        async fn set_field(&self, _: EntityType, _: EntityId, _: &str, _: Value) -> DbResult<()> {
            std::future::pending().await
        }

        async fn delete(&self, _: EntityType, _: EntityId) -> DbResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_deadline_surfaces_as_timeout() {
        let store = TimeoutStore::new(Arc::new(StalledStore), Duration::from_millis(20));
        let result = store.get(EntityType::Project, 1).await;
        assert!(matches!(result, Err(DbError::Timeout(20))));
    }

    #[tokio::test]
    async fn test_fast_calls_pass_through() {
        let store = TimeoutStore::new(
            Arc::new(MemoryObjectStore::new()),
            Duration::from_secs(5),
        );
        let id = store
            .create(EntityType::Project, FieldMap::new())
            .await
            .unwrap();
        assert!(store.get(EntityType::Project, id).await.unwrap().is_some());
    }
}
