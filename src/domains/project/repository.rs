use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::repository::{FindById, HardDeletable, SoftDeletable};
use crate::domains::project::types::{NewProject, Project, UpdateProject};
use crate::errors::{DomainError, DomainResult};
use crate::store::fields;
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::{ChangeEvent, ChangeOrigin, EntityId};

/// Trait defining project repository operations
#[async_trait]
pub trait ProjectRepository:
    FindById<Project> + SoftDeletable + HardDeletable + Send + Sync
{
    async fn create(&self, new_project: &NewProject) -> DomainResult<Project>;

    async fn update(&self, id: EntityId, update: &UpdateProject) -> DomainResult<Project>;

    async fn find_by_organization(&self, organization_id: EntityId) -> DomainResult<Vec<Project>>;

    async fn find_by_status(&self, status: &str) -> DomainResult<Vec<Project>>;

    /// Every assigned project reference number, trashed projects included;
    /// a reference is never reissued, even when its project is gone.
    async fn all_reference_numbers(&self) -> DomainResult<Vec<String>>;

    /// Persist a freshly generated reference. Marked as a reference-sync
    /// write so the assignment hook does not re-enter on its own persist.
    async fn set_reference(&self, id: EntityId, reference: &str) -> DomainResult<()>;
}

/// Object-store implementation for ProjectRepository
pub struct StoreProjectRepository {
    store: Arc<dyn ObjectStore>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl StoreProjectRepository {
    pub fn new(store: Arc<dyn ObjectStore>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    async fn load(&self, id: EntityId) -> DomainResult<Project> {
        let map = self
            .store
            .get(EntityType::Project, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Project", id))?;
        if fields::is_deleted(&map) {
            return Err(DomainError::EntityNotFound("Project", id));
        }
        Project::from_fields(id, &map)
    }

    async fn load_many(&self, ids: Vec<EntityId>) -> DomainResult<Vec<Project>> {
        let mut projects = Vec::with_capacity(ids.len());
        for id in ids {
            projects.push(self.load(id).await?);
        }
        Ok(projects)
    }
}

#[async_trait]
impl FindById<Project> for StoreProjectRepository {
    async fn find_by_id(&self, id: EntityId) -> DomainResult<Project> {
        self.load(id).await
    }
}

#[async_trait]
impl SoftDeletable for StoreProjectRepository {
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::Project,
                id,
                "deleted_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Project, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl HardDeletable for StoreProjectRepository {
    fn entity_name(&self) -> &'static str {
        "project"
    }

    async fn hard_delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete(EntityType::Project, id).await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Project, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for StoreProjectRepository {
    async fn create(&self, new_project: &NewProject) -> DomainResult<Project> {
        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert(
            "organization_id".to_string(),
            Value::from(new_project.organization_id),
        );
        map.insert("name".to_string(), Value::String(new_project.name.clone()));
        map.insert(
            "status".to_string(),
            Value::String(new_project.status.as_str().to_string()),
        );
        map.insert(
            "total_budget".to_string(),
            fields::decimal_value(new_project.total_budget),
        );
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::Project, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::Project, id))
            .await;
        self.load(id).await
    }

    async fn update(&self, id: EntityId, update: &UpdateProject) -> DomainResult<Project> {
        self.load(id).await?;

        if let Some(name) = &update.name {
            self.store
                .set_field(EntityType::Project, id, "name", Value::String(name.clone()))
                .await?;
        }
        if let Some(status) = update.status {
            self.store
                .set_field(
                    EntityType::Project,
                    id,
                    "status",
                    Value::String(status.as_str().to_string()),
                )
                .await?;
        }
        if let Some(budget) = update.total_budget {
            self.store
                .set_field(EntityType::Project, id, "total_budget", fields::decimal_value(budget))
                .await?;
        }
        self.store
            .set_field(
                EntityType::Project,
                id,
                "updated_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;

        self.dispatcher
            .dispatch(ChangeEvent::updated(EntityType::Project, id))
            .await;
        self.load(id).await
    }

    async fn find_by_organization(&self, organization_id: EntityId) -> DomainResult<Vec<Project>> {
        let ids = self
            .store
            .find(
                EntityType::Project,
                &[
                    Filter::eq("organization_id", organization_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;
        self.load_many(ids).await
    }

    async fn find_by_status(&self, status: &str) -> DomainResult<Vec<Project>> {
        let ids = self
            .store
            .find(
                EntityType::Project,
                &[
                    Filter::eq("status", status),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;
        self.load_many(ids).await
    }

    async fn all_reference_numbers(&self) -> DomainResult<Vec<String>> {
        let ids = self
            .store
            .find(EntityType::Project, &[Filter::ne("reference_number", Value::Null)])
            .await?;

        let mut references = Vec::with_capacity(ids.len());
        for id in ids {
            let map = self
                .store
                .get(EntityType::Project, id)
                .await?
                .ok_or(DomainError::EntityNotFound("Project", id))?;
            if let Some(reference) = fields::opt_string(&map, "reference_number") {
                references.push(reference);
            }
        }
        Ok(references)
    }

    async fn set_reference(&self, id: EntityId, reference: &str) -> DomainResult<()> {
        self.store
            .set_field(
                EntityType::Project,
                id,
                "reference_number",
                Value::String(reference.to_string()),
            )
            .await?;
        self.dispatcher
            .dispatch(
                ChangeEvent::updated(EntityType::Project, id)
                    .with_origin(ChangeOrigin::ReferenceSync),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::project::types::ProjectStatus;
    use crate::store::MemoryObjectStore;
    use rust_decimal_macros::dec;

    fn repo() -> StoreProjectRepository {
        StoreProjectRepository::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(ChangeDispatcher::new()),
        )
    }

    fn relaunch() -> NewProject {
        NewProject {
            organization_id: 1,
            name: "Website Relaunch".to_string(),
            status: ProjectStatus::Active,
            total_budget: dec!(15000),
        }
    }

    #[tokio::test]
    async fn test_create_has_no_reference_until_assigned() {
        let repo = repo();
        let project = repo.create(&relaunch()).await.unwrap();
        assert!(!project.has_reference());

        repo.set_reference(project.id, "PR-0001").await.unwrap();
        let project = repo.find_by_id(project.id).await.unwrap();
        assert_eq!(project.reference_number.as_deref(), Some("PR-0001"));
    }

    #[tokio::test]
    async fn test_reference_scan_includes_trashed_projects() {
        let repo = repo();
        let kept = repo.create(&relaunch()).await.unwrap();
        let trashed = repo.create(&relaunch()).await.unwrap();
        repo.set_reference(kept.id, "PR-0001").await.unwrap();
        repo.set_reference(trashed.id, "PR-0002").await.unwrap();
        repo.soft_delete(trashed.id).await.unwrap();

        let mut references = repo.all_reference_numbers().await.unwrap();
        references.sort();
        assert_eq!(references, vec!["PR-0001".to_string(), "PR-0002".to_string()]);
    }

    #[tokio::test]
    async fn test_find_by_status() {
        let repo = repo();
        repo.create(&relaunch()).await.unwrap();
        let done = repo
            .create(&NewProject {
                status: ProjectStatus::Completed,
                ..relaunch()
            })
            .await
            .unwrap();

        let completed = repo.find_by_status("completed").await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, done.id);
    }
}
