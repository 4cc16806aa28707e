use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::cache::{keys, remember, Cache};
use crate::config::EngineConfig;
use crate::domains::core::repository::{HardDeletable, SoftDeletable};
use crate::domains::time_entry::repository::TimeEntryRepository;
use crate::domains::time_entry::types::{NewTimeEntry, TimeEntry};
use crate::errors::ServiceResult;
use crate::types::EntityId;
use crate::validation::Validate;

/// Trait defining time entry service operations
#[async_trait]
pub trait TimeEntryService: Send + Sync {
    async fn log_time(&self, new_entry: NewTimeEntry) -> ServiceResult<TimeEntry>;

    async fn get_entry(&self, id: EntityId) -> ServiceResult<TimeEntry>;

    async fn delete_entry(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()>;

    /// Raw logged hours against a service request; cached.
    async fn hours_for_service_request(&self, id: EntityId) -> ServiceResult<Decimal>;

    /// Raw logged hours against a project; cached.
    async fn hours_for_project(&self, id: EntityId) -> ServiceResult<Decimal>;

    /// Raw logged hours against a milestone; cached.
    async fn hours_for_milestone(&self, id: EntityId) -> ServiceResult<Decimal>;
}

/// Time entry service implementation
pub struct TimeEntryServiceImpl {
    repo: Arc<dyn TimeEntryRepository>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl TimeEntryServiceImpl {
    pub fn new(
        repo: Arc<dyn TimeEntryRepository>,
        cache: Arc<dyn Cache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repo,
            cache,
            cache_ttl: config.cache_ttl,
        }
    }
}

fn sum_hours(entries: &[TimeEntry]) -> Decimal {
    entries.iter().map(|e| e.hours).sum()
}

#[async_trait]
impl TimeEntryService for TimeEntryServiceImpl {
    async fn log_time(&self, new_entry: NewTimeEntry) -> ServiceResult<TimeEntry> {
        new_entry.validate()?;
        Ok(self.repo.create(&new_entry).await?)
    }

    async fn get_entry(&self, id: EntityId) -> ServiceResult<TimeEntry> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn delete_entry(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()> {
        if hard_delete {
            self.repo.hard_delete(id).await?;
        } else {
            self.repo.soft_delete(id).await?;
        }
        Ok(())
    }

    async fn hours_for_service_request(&self, id: EntityId) -> ServiceResult<Decimal> {
        let key = keys::service_request_hours(id);
        let hours = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            Ok(sum_hours(&self.repo.find_by_service_request(id).await?))
        })
        .await?;
        Ok(hours)
    }

    async fn hours_for_project(&self, id: EntityId) -> ServiceResult<Decimal> {
        let key = keys::project_hours(id);
        let hours = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            Ok(sum_hours(&self.repo.find_by_project(id).await?))
        })
        .await?;
        Ok(hours)
    }

    async fn hours_for_milestone(&self, id: EntityId) -> ServiceResult<Decimal> {
        let key = keys::milestone_hours(id);
        let hours = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            Ok(sum_hours(&self.repo.find_by_milestone(id).await?))
        })
        .await?;
        Ok(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domains::core::hooks::ChangeDispatcher;
    use crate::domains::time_entry::repository::StoreTimeEntryRepository;
    use crate::domains::time_entry::types::TimeEntryScope;
    use crate::store::MemoryObjectStore;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn service() -> TimeEntryServiceImpl {
        let store = Arc::new(MemoryObjectStore::new());
        let dispatcher = Arc::new(ChangeDispatcher::new());
        TimeEntryServiceImpl::new(
            Arc::new(StoreTimeEntryRepository::new(store, dispatcher)),
            Arc::new(MemoryCache::new()),
            &EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_project_hours_rollup() {
        let service = service();
        let date = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        for hours in [dec!(1.5), dec!(2.25)] {
            service
                .log_time(NewTimeEntry {
                    hours,
                    entry_date: date,
                    billable: true,
                    description: None,
                    scope: TimeEntryScope::Project(2),
                })
                .await
                .unwrap();
        }

        assert_eq!(service.hours_for_project(2).await.unwrap(), dec!(3.75));
        // Second read is served from cache.
        assert_eq!(service.hours_for_project(2).await.unwrap(), dec!(3.75));
    }
}
