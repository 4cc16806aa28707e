use serde::{Serialize, Deserialize};

use crate::store::EntityType;

/// Identifier assigned by the object store to every document.
pub type EntityId = i64;

/// Kind of write behind a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Who performed a write.
///
/// `ReferenceSync` marks writes issued by the reference generator itself, so
/// the assignment hook never re-enters on its own persist. `Revision` marks
/// the store's autosave/revision shadow writes, which must not reach the
/// invalidation router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOrigin {
    Edit,
    ReferenceSync,
    Revision,
}

/// One entity mutation, dispatched after the write lands.
///
/// For deletions the entity type is captured before removal, so routing
/// still works once the document is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity_type: EntityType,
    pub id: EntityId,
    pub kind: ChangeKind,
    pub origin: ChangeOrigin,
}

impl ChangeEvent {
    pub fn created(entity_type: EntityType, id: EntityId) -> Self {
        Self {
            entity_type,
            id,
            kind: ChangeKind::Created,
            origin: ChangeOrigin::Edit,
        }
    }

    pub fn updated(entity_type: EntityType, id: EntityId) -> Self {
        Self {
            entity_type,
            id,
            kind: ChangeKind::Updated,
            origin: ChangeOrigin::Edit,
        }
    }

    pub fn deleted(entity_type: EntityType, id: EntityId) -> Self {
        Self {
            entity_type,
            id,
            kind: ChangeKind::Deleted,
            origin: ChangeOrigin::Edit,
        }
    }

    pub fn with_origin(mut self, origin: ChangeOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl PaginationParams {
    pub fn offset(&self) -> usize {
        ((self.page.max(1) - 1) * self.per_page) as usize
    }
}

/// Paginated result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, params: PaginationParams) -> Self {
        let total_pages = (total as f64 / params.per_page as f64).ceil() as u32;
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
        }
    }
}
