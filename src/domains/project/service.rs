use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::cache::{keys, remember, Cache};
use crate::config::EngineConfig;
use crate::domains::core::repository::{HardDeletable, SoftDeletable};
use crate::domains::milestone::repository::MilestoneRepository;
use crate::domains::organization::repository::OrganizationRepository;
use crate::domains::project::repository::ProjectRepository;
use crate::domains::project::types::{NewProject, Project, ProjectStatus, UpdateProject};
use crate::errors::ServiceResult;
use crate::types::EntityId;
use crate::validation::Validate;

/// Trait defining project service operations
#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn create_project(&self, new_project: NewProject) -> ServiceResult<Project>;

    async fn get_project(&self, id: EntityId) -> ServiceResult<Project>;

    async fn update_project(&self, id: EntityId, update: UpdateProject) -> ServiceResult<Project>;

    async fn delete_project(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()>;

    async fn projects_for_organization(
        &self,
        organization_id: EntityId,
    ) -> ServiceResult<Vec<Project>>;

    /// Up to `limit` active projects for workbench-style lists; cached.
    async fn active_projects(&self, limit: u32) -> ServiceResult<Vec<Project>>;

    /// Effective budget: the milestone amounts when milestones exist, the
    /// project's own figure otherwise; cached.
    async fn project_budget(&self, id: EntityId) -> ServiceResult<Decimal>;
}

/// Project service implementation
pub struct ProjectServiceImpl {
    repo: Arc<dyn ProjectRepository>,
    organization_repo: Arc<dyn OrganizationRepository>,
    milestone_repo: Arc<dyn MilestoneRepository>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl ProjectServiceImpl {
    pub fn new(
        repo: Arc<dyn ProjectRepository>,
        organization_repo: Arc<dyn OrganizationRepository>,
        milestone_repo: Arc<dyn MilestoneRepository>,
        cache: Arc<dyn Cache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repo,
            organization_repo,
            milestone_repo,
            cache,
            cache_ttl: config.cache_ttl,
        }
    }
}

#[async_trait]
impl ProjectService for ProjectServiceImpl {
    async fn create_project(&self, new_project: NewProject) -> ServiceResult<Project> {
        new_project.validate()?;
        // The owning organization must be live.
        self.organization_repo
            .find_by_id(new_project.organization_id)
            .await?;
        Ok(self.repo.create(&new_project).await?)
    }

    async fn get_project(&self, id: EntityId) -> ServiceResult<Project> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn update_project(&self, id: EntityId, update: UpdateProject) -> ServiceResult<Project> {
        update.validate()?;
        Ok(self.repo.update(id, &update).await?)
    }

    async fn delete_project(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()> {
        if hard_delete {
            self.repo.hard_delete(id).await?;
        } else {
            self.repo.soft_delete(id).await?;
        }
        Ok(())
    }

    async fn projects_for_organization(
        &self,
        organization_id: EntityId,
    ) -> ServiceResult<Vec<Project>> {
        Ok(self.repo.find_by_organization(organization_id).await?)
    }

    async fn active_projects(&self, limit: u32) -> ServiceResult<Vec<Project>> {
        let key = keys::active_projects(limit);
        let projects = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            let mut projects = self
                .repo
                .find_by_status(ProjectStatus::Active.as_str())
                .await?;
            projects.truncate(limit as usize);
            Ok(projects)
        })
        .await?;
        Ok(projects)
    }

    async fn project_budget(&self, id: EntityId) -> ServiceResult<Decimal> {
        let key = keys::project_rollup(id);
        let budget = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            let project = self.repo.find_by_id(id).await?;
            let milestones = self.milestone_repo.find_by_project(id).await?;
            if milestones.is_empty() {
                Ok(project.total_budget)
            } else {
                Ok(milestones.iter().map(|m| m.amount).sum())
            }
        })
        .await?;
        Ok(budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domains::core::hooks::ChangeDispatcher;
    use crate::domains::milestone::repository::StoreMilestoneRepository;
    use crate::domains::milestone::types::{NewMilestone, WorkStatus};
    use crate::domains::organization::repository::StoreOrganizationRepository;
    use crate::domains::organization::types::NewOrganization;
    use crate::store::MemoryObjectStore;
    use rust_decimal_macros::dec;

    struct Fixture {
        milestones: Arc<StoreMilestoneRepository>,
        service: ProjectServiceImpl,
        organization_id: EntityId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryObjectStore::new());
        let dispatcher = Arc::new(ChangeDispatcher::new());
        let organizations = Arc::new(StoreOrganizationRepository::new(
            store.clone(),
            dispatcher.clone(),
        ));
        let projects = Arc::new(crate::domains::project::repository::StoreProjectRepository::new(
            store.clone(),
            dispatcher.clone(),
        ));
        let milestones = Arc::new(StoreMilestoneRepository::new(store, dispatcher));

        let organization = organizations
            .create(&NewOrganization {
                shortcode: "ACME".to_string(),
                name: "Acme Corp".to_string(),
                free_hours_limit: None,
            })
            .await
            .unwrap();

        let service = ProjectServiceImpl::new(
            projects,
            organizations,
            milestones.clone(),
            Arc::new(MemoryCache::new()),
            &EngineConfig::default(),
        );
        Fixture {
            milestones,
            service,
            organization_id: organization.id,
        }
    }

    fn new_project(organization_id: EntityId) -> NewProject {
        NewProject {
            organization_id,
            name: "Website Relaunch".to_string(),
            status: ProjectStatus::Active,
            total_budget: dec!(15000),
        }
    }

    #[tokio::test]
    async fn test_budget_falls_back_to_project_figure() {
        let f = fixture().await;
        let project = f
            .service
            .create_project(new_project(f.organization_id))
            .await
            .unwrap();
        assert_eq!(f.service.project_budget(project.id).await.unwrap(), dec!(15000));
    }

    #[tokio::test]
    async fn test_budget_uses_milestones_when_present() {
        let f = fixture().await;
        let project = f
            .service
            .create_project(new_project(f.organization_id))
            .await
            .unwrap();
        for (order, amount) in [(dec!(1), dec!(4000)), (dec!(2), dec!(2500))] {
            f.milestones
                .create(&NewMilestone {
                    project_id: project.id,
                    name: format!("Phase {}", order),
                    order,
                    amount,
                    work_status: WorkStatus::Planned,
                    is_deposit: false,
                })
                .await
                .unwrap();
        }

        assert_eq!(f.service.project_budget(project.id).await.unwrap(), dec!(6500));
    }

    #[tokio::test]
    async fn test_create_requires_live_organization() {
        let f = fixture().await;
        let orphan = f.service.create_project(new_project(999)).await;
        assert!(orphan.is_err());
    }
}
