use async_trait::async_trait;

use crate::errors::DomainResult;
use crate::types::EntityId;

/// Trait for finding entities by ID
#[async_trait]
pub trait FindById<T> {
    /// Find an entity by ID
    async fn find_by_id(&self, id: EntityId) -> DomainResult<T>;
}

/// Trait for entities that support soft deletion
///
/// A soft delete stamps `deleted_at`; trashed documents drop out of every
/// repository query but stay in the store for recovery.
#[async_trait]
pub trait SoftDeletable {
    /// Soft delete an entity by ID
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()>;
}

/// Trait for entities that support hard deletion
#[async_trait]
pub trait HardDeletable {
    /// The name of the entity in the store (for logging and not-found errors)
    fn entity_name(&self) -> &'static str;

    /// Hard delete an entity by ID
    async fn hard_delete(&self, id: EntityId) -> DomainResult<()>;
}
