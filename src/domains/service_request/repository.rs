use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::repository::{FindById, HardDeletable, SoftDeletable};
use crate::domains::service_request::types::{NewServiceRequest, RequestStatus, ServiceRequest};
use crate::errors::{DomainError, DomainResult};
use crate::store::fields;
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::{ChangeEvent, EntityId};

/// Trait defining service request repository operations
#[async_trait]
pub trait ServiceRequestRepository:
    FindById<ServiceRequest> + SoftDeletable + HardDeletable + Send + Sync
{
    async fn create(&self, new_request: &NewServiceRequest) -> DomainResult<ServiceRequest>;

    async fn find_by_organization(
        &self,
        organization_id: EntityId,
    ) -> DomainResult<Vec<ServiceRequest>>;

    /// Ids only; the monthly report engine needs the set, not the rows.
    async fn ids_for_organization(&self, organization_id: EntityId) -> DomainResult<Vec<EntityId>>;

    async fn set_status(&self, id: EntityId, status: RequestStatus) -> DomainResult<()>;

    /// Reassign the owning organization. Historical monthly reports follow
    /// the request's current organization, so this moves its hours too.
    async fn set_organization(&self, id: EntityId, organization_id: EntityId) -> DomainResult<()>;
}

/// Object-store implementation for ServiceRequestRepository
pub struct StoreServiceRequestRepository {
    store: Arc<dyn ObjectStore>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl StoreServiceRequestRepository {
    pub fn new(store: Arc<dyn ObjectStore>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    async fn load(&self, id: EntityId) -> DomainResult<ServiceRequest> {
        let map = self
            .store
            .get(EntityType::ServiceRequest, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Service request", id))?;
        if fields::is_deleted(&map) {
            return Err(DomainError::EntityNotFound("Service request", id));
        }
        ServiceRequest::from_fields(id, &map)
    }
}

#[async_trait]
impl FindById<ServiceRequest> for StoreServiceRequestRepository {
    async fn find_by_id(&self, id: EntityId) -> DomainResult<ServiceRequest> {
        self.load(id).await
    }
}

#[async_trait]
impl SoftDeletable for StoreServiceRequestRepository {
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::ServiceRequest,
                id,
                "deleted_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::ServiceRequest, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl HardDeletable for StoreServiceRequestRepository {
    fn entity_name(&self) -> &'static str {
        "service_request"
    }

    async fn hard_delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete(EntityType::ServiceRequest, id).await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::ServiceRequest, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl ServiceRequestRepository for StoreServiceRequestRepository {
    async fn create(&self, new_request: &NewServiceRequest) -> DomainResult<ServiceRequest> {
        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert(
            "organization_id".to_string(),
            Value::from(new_request.organization_id),
        );
        map.insert("title".to_string(), Value::String(new_request.title.clone()));
        map.insert(
            "status".to_string(),
            Value::String(new_request.status.as_str().to_string()),
        );
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::ServiceRequest, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::ServiceRequest, id))
            .await;
        self.load(id).await
    }

    async fn find_by_organization(
        &self,
        organization_id: EntityId,
    ) -> DomainResult<Vec<ServiceRequest>> {
        let ids = self.ids_for_organization(organization_id).await?;
        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            requests.push(self.load(id).await?);
        }
        Ok(requests)
    }

    async fn ids_for_organization(&self, organization_id: EntityId) -> DomainResult<Vec<EntityId>> {
        Ok(self
            .store
            .find(
                EntityType::ServiceRequest,
                &[
                    Filter::eq("organization_id", organization_id),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?)
    }

    async fn set_status(&self, id: EntityId, status: RequestStatus) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::ServiceRequest,
                id,
                "status",
                Value::String(status.as_str().to_string()),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::updated(EntityType::ServiceRequest, id))
            .await;
        Ok(())
    }

    async fn set_organization(&self, id: EntityId, organization_id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::ServiceRequest,
                id,
                "organization_id",
                Value::from(organization_id),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::updated(EntityType::ServiceRequest, id))
            .await;
        Ok(())
    }
}
