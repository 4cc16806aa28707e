use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::repository::{FindById, HardDeletable, SoftDeletable};
use crate::domains::report::types::{MonthlyReport, NewMonthlyReport};
use crate::errors::{DomainError, DomainResult};
use crate::store::fields;
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::{ChangeEvent, EntityId};

/// Trait defining monthly report repository operations
#[async_trait]
pub trait MonthlyReportRepository:
    FindById<MonthlyReport> + SoftDeletable + HardDeletable + Send + Sync
{
    async fn create(&self, new_report: &NewMonthlyReport) -> DomainResult<MonthlyReport>;

    async fn find_by_organization(
        &self,
        organization_id: EntityId,
    ) -> DomainResult<Vec<MonthlyReport>>;
}

/// Object-store implementation for MonthlyReportRepository
pub struct StoreMonthlyReportRepository {
    store: Arc<dyn ObjectStore>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl StoreMonthlyReportRepository {
    pub fn new(store: Arc<dyn ObjectStore>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    async fn load(&self, id: EntityId) -> DomainResult<MonthlyReport> {
        let map = self
            .store
            .get(EntityType::MonthlyReport, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Monthly report", id))?;
        if fields::is_deleted(&map) {
            return Err(DomainError::EntityNotFound("Monthly report", id));
        }
        MonthlyReport::from_fields(id, &map)
    }
}

#[async_trait]
impl FindById<MonthlyReport> for StoreMonthlyReportRepository {
    async fn find_by_id(&self, id: EntityId) -> DomainResult<MonthlyReport> {
        self.load(id).await
    }
}

#[async_trait]
impl SoftDeletable for StoreMonthlyReportRepository {
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::MonthlyReport,
                id,
                "deleted_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::MonthlyReport, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl HardDeletable for StoreMonthlyReportRepository {
    fn entity_name(&self) -> &'static str {
        "monthly_report"
    }

    async fn hard_delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete(EntityType::MonthlyReport, id).await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::MonthlyReport, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl MonthlyReportRepository for StoreMonthlyReportRepository {
    async fn create(&self, new_report: &NewMonthlyReport) -> DomainResult<MonthlyReport> {
        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert(
            "organization_id".to_string(),
            Value::from(new_report.organization_id),
        );
        map.insert(
            "report_month".to_string(),
            Value::String(new_report.report_month.clone()),
        );
        if let Some(limit) = new_report.free_hours_limit {
            map.insert("free_hours_limit".to_string(), fields::decimal_value(limit));
        }
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::MonthlyReport, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::MonthlyReport, id))
            .await;
        self.load(id).await
    }

    async fn find_by_organization(
        &self,
        organization_id: EntityId,
    ) -> DomainResult<Vec<MonthlyReport>> {
        let ids = self
            .store
            .find(
                EntityType::MonthlyReport,
                &[
                    Filter::eq("organization_id", organization_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;

        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            reports.push(self.load(id).await?);
        }
        Ok(reports)
    }
}
