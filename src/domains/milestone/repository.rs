use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::repository::{FindById, HardDeletable, SoftDeletable};
use crate::domains::milestone::types::{Milestone, NewMilestone, UpdateMilestone};
use crate::errors::{DomainError, DomainResult};
use crate::store::fields;
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::{ChangeEvent, ChangeOrigin, EntityId};

/// Trait defining milestone repository operations
#[async_trait]
pub trait MilestoneRepository:
    FindById<Milestone> + SoftDeletable + HardDeletable + Send + Sync
{
    async fn create(&self, new_milestone: &NewMilestone) -> DomainResult<Milestone>;

    async fn update(&self, id: EntityId, update: &UpdateMilestone) -> DomainResult<Milestone>;

    /// Live milestones of a project, ascending by `order`.
    async fn find_by_project(&self, project_id: EntityId) -> DomainResult<Vec<Milestone>>;

    async fn count_by_project(&self, project_id: EntityId) -> DomainResult<usize>;

    /// Persist a freshly generated reference. Marked as a reference-sync
    /// write so the assignment hook does not re-enter on its own persist.
    async fn set_reference(&self, id: EntityId, reference: &str) -> DomainResult<()>;
}

/// Object-store implementation for MilestoneRepository
pub struct StoreMilestoneRepository {
    store: Arc<dyn ObjectStore>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl StoreMilestoneRepository {
    pub fn new(store: Arc<dyn ObjectStore>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    async fn load(&self, id: EntityId) -> DomainResult<Milestone> {
        let map = self
            .store
            .get(EntityType::Milestone, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Milestone", id))?;
        if fields::is_deleted(&map) {
            return Err(DomainError::EntityNotFound("Milestone", id));
        }
        Milestone::from_fields(id, &map)
    }
}

#[async_trait]
impl FindById<Milestone> for StoreMilestoneRepository {
    async fn find_by_id(&self, id: EntityId) -> DomainResult<Milestone> {
        self.load(id).await
    }
}

#[async_trait]
impl SoftDeletable for StoreMilestoneRepository {
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::Milestone,
                id,
                "deleted_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Milestone, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl HardDeletable for StoreMilestoneRepository {
    fn entity_name(&self) -> &'static str {
        "milestone"
    }

    async fn hard_delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete(EntityType::Milestone, id).await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Milestone, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl MilestoneRepository for StoreMilestoneRepository {
    async fn create(&self, new_milestone: &NewMilestone) -> DomainResult<Milestone> {
        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert("project_id".to_string(), Value::from(new_milestone.project_id));
        map.insert("name".to_string(), Value::String(new_milestone.name.clone()));
        map.insert("order".to_string(), fields::decimal_value(new_milestone.order));
        map.insert("amount".to_string(), fields::decimal_value(new_milestone.amount));
        map.insert(
            "work_status".to_string(),
            Value::String(new_milestone.work_status.as_str().to_string()),
        );
        map.insert("is_deposit".to_string(), Value::Bool(new_milestone.is_deposit));
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::Milestone, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::Milestone, id))
            .await;
        self.load(id).await
    }

    async fn update(&self, id: EntityId, update: &UpdateMilestone) -> DomainResult<Milestone> {
        self.load(id).await?;

        if let Some(name) = &update.name {
            self.store
                .set_field(EntityType::Milestone, id, "name", Value::String(name.clone()))
                .await?;
        }
        if let Some(amount) = update.amount {
            self.store
                .set_field(EntityType::Milestone, id, "amount", fields::decimal_value(amount))
                .await?;
        }
        if let Some(work_status) = update.work_status {
            self.store
                .set_field(
                    EntityType::Milestone,
                    id,
                    "work_status",
                    Value::String(work_status.as_str().to_string()),
                )
                .await?;
        }
        if let Some(is_deposit) = update.is_deposit {
            self.store
                .set_field(EntityType::Milestone, id, "is_deposit", Value::Bool(is_deposit))
                .await?;
        }
        self.store
            .set_field(
                EntityType::Milestone,
                id,
                "updated_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;

        self.dispatcher
            .dispatch(ChangeEvent::updated(EntityType::Milestone, id))
            .await;
        self.load(id).await
    }

    async fn find_by_project(&self, project_id: EntityId) -> DomainResult<Vec<Milestone>> {
        let ids = self
            .store
            .find(
                EntityType::Milestone,
                &[
                    Filter::eq("project_id", project_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;

        let mut milestones = Vec::with_capacity(ids.len());
        for id in ids {
            milestones.push(self.load(id).await?);
        }
        milestones.sort_by(|a, b| a.order.cmp(&b.order));
        Ok(milestones)
    }

    async fn count_by_project(&self, project_id: EntityId) -> DomainResult<usize> {
        let ids = self
            .store
            .find(
                EntityType::Milestone,
                &[
                    Filter::eq("project_id", project_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;
        Ok(ids.len())
    }

    async fn set_reference(&self, id: EntityId, reference: &str) -> DomainResult<()> {
        self.store
            .set_field(
                EntityType::Milestone,
                id,
                "reference_number",
                Value::String(reference.to_string()),
            )
            .await?;
        self.dispatcher
            .dispatch(
                ChangeEvent::updated(EntityType::Milestone, id)
                    .with_origin(ChangeOrigin::ReferenceSync),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::milestone::types::WorkStatus;
    use crate::store::MemoryObjectStore;
    use rust_decimal_macros::dec;

    fn repo() -> StoreMilestoneRepository {
        StoreMilestoneRepository::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(ChangeDispatcher::new()),
        )
    }

    fn milestone(order: rust_decimal::Decimal) -> NewMilestone {
        NewMilestone {
            project_id: 1,
            name: format!("Phase {}", order),
            order,
            amount: dec!(1000),
            work_status: WorkStatus::Planned,
            is_deposit: false,
        }
    }

    #[tokio::test]
    async fn test_find_by_project_sorted_by_order() {
        let repo = repo();
        repo.create(&milestone(dec!(2))).await.unwrap();
        repo.create(&milestone(dec!(1))).await.unwrap();
        repo.create(&milestone(dec!(1.5))).await.unwrap();

        let milestones = repo.find_by_project(1).await.unwrap();
        let orders: Vec<_> = milestones.iter().map(|m| m.order.unwrap()).collect();
        assert_eq!(orders, vec![dec!(1), dec!(1.5), dec!(2)]);
    }

    #[tokio::test]
    async fn test_count_excludes_trashed() {
        let repo = repo();
        let first = repo.create(&milestone(dec!(1))).await.unwrap();
        repo.create(&milestone(dec!(2))).await.unwrap();
        assert_eq!(repo.count_by_project(1).await.unwrap(), 2);

        repo.soft_delete(first.id).await.unwrap();
        assert_eq!(repo.count_by_project(1).await.unwrap(), 1);
    }
}
