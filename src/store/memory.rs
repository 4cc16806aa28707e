use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::{DbError, DbResult};
use crate::store::{matches_filter, EntityType, FieldMap, Filter, ObjectStore};
use crate::types::EntityId;

/// In-process object store.
///
/// Reference implementation of the store contract; the unit and scenario
/// tests run against it. Ids are assigned from a single ascending counter
/// across all entity types, matching how the production store numbers
/// documents.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<(EntityType, EntityId), FieldMap>,
    next_id: EntityId,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, entity_type: EntityType, id: EntityId) -> DbResult<Option<FieldMap>> {
        let inner = self.inner.read().await;
        Ok(inner.documents.get(&(entity_type, id)).cloned())
    }

    async fn find(&self, entity_type: EntityType, filters: &[Filter]) -> DbResult<Vec<EntityId>> {
        let inner = self.inner.read().await;
        let ids = inner
            .documents
            .iter()
            .filter(|((doc_type, _), _)| *doc_type == entity_type)
            .filter(|(_, fields)| {
                filters.iter().all(|filter| {
                    let value = fields.get(&filter.field).unwrap_or(&Value::Null);
                    matches_filter(value, filter)
                })
            })
            .map(|((_, id), _)| *id)
            .collect();
        Ok(ids)
    }

    async fn create(&self, entity_type: EntityType, fields: FieldMap) -> DbResult<EntityId> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.documents.insert((entity_type, id), fields);
        Ok(id)
    }

    async fn set_field(
        &self,
        entity_type: EntityType,
        id: EntityId,
        field: &str,
        value: Value,
    ) -> DbResult<()> {
        let mut inner = self.inner.write().await;
        let fields = inner
            .documents
            .get_mut(&(entity_type, id))
            .ok_or(DbError::NotFound(entity_type.as_str(), id))?;
        fields.insert(field.to_string(), value);
        Ok(())
    }

    async fn delete(&self, entity_type: EntityType, id: EntityId) -> DbResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .documents
            .remove(&(entity_type, id))
            .ok_or(DbError::NotFound(entity_type.as_str(), id))?;
        Ok(())
    }
}
