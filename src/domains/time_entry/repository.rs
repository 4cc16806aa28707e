use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::repository::{FindById, HardDeletable, SoftDeletable};
use crate::domains::time_entry::types::{NewTimeEntry, TimeEntry, TimeEntryScope};
use crate::errors::{DomainError, DomainResult};
use crate::store::fields;
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::{ChangeEvent, EntityId};

/// Trait defining time entry repository operations
#[async_trait]
pub trait TimeEntryRepository:
    FindById<TimeEntry> + SoftDeletable + HardDeletable + Send + Sync
{
    async fn create(&self, new_entry: &NewTimeEntry) -> DomainResult<TimeEntry>;

    async fn find_by_service_request(
        &self,
        service_request_id: EntityId,
    ) -> DomainResult<Vec<TimeEntry>>;

    async fn find_by_project(&self, project_id: EntityId) -> DomainResult<Vec<TimeEntry>>;

    async fn find_by_milestone(&self, milestone_id: EntityId) -> DomainResult<Vec<TimeEntry>>;

    /// Entries linked to any of the given service requests whose date falls
    /// within `[from, to]`, ascending by date. This is the monthly report
    /// association: organization plus calendar month, no stored foreign key.
    async fn find_for_service_requests_in_window(
        &self,
        service_request_ids: &[EntityId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<Vec<TimeEntry>>;
}

/// Object-store implementation for TimeEntryRepository
pub struct StoreTimeEntryRepository {
    store: Arc<dyn ObjectStore>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl StoreTimeEntryRepository {
    pub fn new(store: Arc<dyn ObjectStore>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    async fn load(&self, id: EntityId) -> DomainResult<TimeEntry> {
        let map = self
            .store
            .get(EntityType::TimeEntry, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Time entry", id))?;
        if fields::is_deleted(&map) {
            return Err(DomainError::EntityNotFound("Time entry", id));
        }
        TimeEntry::from_fields(id, &map)
    }

    async fn find_by_scope_field(
        &self,
        field: &str,
        scope_id: EntityId,
    ) -> DomainResult<Vec<TimeEntry>> {
        let ids = self
            .store
            .find(
                EntityType::TimeEntry,
                &[
                    Filter::eq(field, scope_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            entries.push(self.load(id).await?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl FindById<TimeEntry> for StoreTimeEntryRepository {
    async fn find_by_id(&self, id: EntityId) -> DomainResult<TimeEntry> {
        self.load(id).await
    }
}

#[async_trait]
impl SoftDeletable for StoreTimeEntryRepository {
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::TimeEntry,
                id,
                "deleted_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::TimeEntry, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl HardDeletable for StoreTimeEntryRepository {
    fn entity_name(&self) -> &'static str {
        "time_entry"
    }

    async fn hard_delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete(EntityType::TimeEntry, id).await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::TimeEntry, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl TimeEntryRepository for StoreTimeEntryRepository {
    async fn create(&self, new_entry: &NewTimeEntry) -> DomainResult<TimeEntry> {
        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert("hours".to_string(), fields::decimal_value(new_entry.hours));
        map.insert("entry_date".to_string(), fields::date_value(new_entry.entry_date));
        map.insert("billable".to_string(), Value::Bool(new_entry.billable));
        if let Some(description) = &new_entry.description {
            map.insert("description".to_string(), Value::String(description.clone()));
        }
        let (field, scope_id) = match new_entry.scope {
            TimeEntryScope::ServiceRequest(id) => ("related_service_request", id),
            TimeEntryScope::Project(id) => ("related_project", id),
            TimeEntryScope::Milestone(id) => ("related_milestone", id),
        };
        map.insert(field.to_string(), Value::from(scope_id));
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::TimeEntry, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::TimeEntry, id))
            .await;
        self.load(id).await
    }

    async fn find_by_service_request(
        &self,
        service_request_id: EntityId,
    ) -> DomainResult<Vec<TimeEntry>> {
        self.find_by_scope_field("related_service_request", service_request_id)
            .await
    }

    async fn find_by_project(&self, project_id: EntityId) -> DomainResult<Vec<TimeEntry>> {
        self.find_by_scope_field("related_project", project_id).await
    }

    async fn find_by_milestone(&self, milestone_id: EntityId) -> DomainResult<Vec<TimeEntry>> {
        self.find_by_scope_field("related_milestone", milestone_id).await
    }

    async fn find_for_service_requests_in_window(
        &self,
        service_request_ids: &[EntityId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<Vec<TimeEntry>> {
        if service_request_ids.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = service_request_ids.iter().map(|id| json!(id)).collect();
        let ids = self
            .store
            .find(
                EntityType::TimeEntry,
                &[
                    Filter::is_in("related_service_request", candidates),
                    Filter::between(
                        "entry_date",
                        from.format("%Y-%m-%d").to_string(),
                        to.format("%Y-%m-%d").to_string(),
                    ),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            entries.push(self.load(id).await?);
        }
        entries.sort_by(|a, b| a.entry_date.cmp(&b.entry_date));
        Ok(entries)
    }
}
