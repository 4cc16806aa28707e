use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::repository::{FindById, HardDeletable, SoftDeletable};
use crate::domains::organization::types::{NewOrganization, Organization, UpdateOrganization};
use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::store::fields;
use crate::store::{EntityType, FieldMap, Filter, ObjectStore};
use crate::types::{ChangeEvent, EntityId};

/// Trait defining organization repository operations
#[async_trait]
pub trait OrganizationRepository:
    FindById<Organization> + SoftDeletable + HardDeletable + Send + Sync
{
    async fn create(&self, new_org: &NewOrganization) -> DomainResult<Organization>;

    async fn update(&self, id: EntityId, update: &UpdateOrganization) -> DomainResult<Organization>;

    async fn find_all(&self) -> DomainResult<Vec<Organization>>;

    async fn find_by_shortcode(&self, shortcode: &str) -> DomainResult<Option<Organization>>;
}

/// Object-store implementation for OrganizationRepository
pub struct StoreOrganizationRepository {
    store: Arc<dyn ObjectStore>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl StoreOrganizationRepository {
    pub fn new(store: Arc<dyn ObjectStore>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Load a live (non-trashed) organization.
    async fn load(&self, id: EntityId) -> DomainResult<Organization> {
        let map = self
            .store
            .get(EntityType::Organization, id)
            .await?
            .ok_or(DomainError::EntityNotFound("Organization", id))?;
        if fields::is_deleted(&map) {
            return Err(DomainError::EntityNotFound("Organization", id));
        }
        Organization::from_fields(id, &map)
    }
}

#[async_trait]
impl FindById<Organization> for StoreOrganizationRepository {
    async fn find_by_id(&self, id: EntityId) -> DomainResult<Organization> {
        self.load(id).await
    }
}

#[async_trait]
impl SoftDeletable for StoreOrganizationRepository {
    async fn soft_delete(&self, id: EntityId) -> DomainResult<()> {
        self.load(id).await?;
        self.store
            .set_field(
                EntityType::Organization,
                id,
                "deleted_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Organization, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl HardDeletable for StoreOrganizationRepository {
    fn entity_name(&self) -> &'static str {
        "organization"
    }

    async fn hard_delete(&self, id: EntityId) -> DomainResult<()> {
        self.store.delete(EntityType::Organization, id).await?;
        self.dispatcher
            .dispatch(ChangeEvent::deleted(EntityType::Organization, id))
            .await;
        Ok(())
    }
}

#[async_trait]
impl OrganizationRepository for StoreOrganizationRepository {
    async fn create(&self, new_org: &NewOrganization) -> DomainResult<Organization> {
        if self.find_by_shortcode(&new_org.shortcode).await?.is_some() {
            return Err(ValidationError::unique("shortcode").into());
        }

        let now = Utc::now();
        let mut map = FieldMap::new();
        map.insert("shortcode".to_string(), Value::String(new_org.shortcode.clone()));
        map.insert("name".to_string(), Value::String(new_org.name.clone()));
        if let Some(limit) = new_org.free_hours_limit {
            map.insert("free_hours_limit".to_string(), fields::decimal_value(limit));
        }
        map.insert("created_at".to_string(), fields::datetime_value(now));
        map.insert("updated_at".to_string(), fields::datetime_value(now));

        let id = self.store.create(EntityType::Organization, map).await?;
        self.dispatcher
            .dispatch(ChangeEvent::created(EntityType::Organization, id))
            .await;
        self.load(id).await
    }

    async fn update(&self, id: EntityId, update: &UpdateOrganization) -> DomainResult<Organization> {
        self.load(id).await?;

        if let Some(name) = &update.name {
            self.store
                .set_field(EntityType::Organization, id, "name", Value::String(name.clone()))
                .await?;
        }
        if let Some(limit) = &update.free_hours_limit {
            let value = match limit {
                Some(limit) => fields::decimal_value(*limit),
                None => Value::Null,
            };
            self.store
                .set_field(EntityType::Organization, id, "free_hours_limit", value)
                .await?;
        }
        self.store
            .set_field(
                EntityType::Organization,
                id,
                "updated_at",
                fields::datetime_value(Utc::now()),
            )
            .await?;

        self.dispatcher
            .dispatch(ChangeEvent::updated(EntityType::Organization, id))
            .await;
        self.load(id).await
    }

    async fn find_all(&self) -> DomainResult<Vec<Organization>> {
        let ids = self
            .store
            .find(EntityType::Organization, &[Filter::eq("deleted_at", Value::Null)])
            .await?;

        let mut organizations = Vec::with_capacity(ids.len());
        for id in ids {
            organizations.push(self.load(id).await?);
        }
        Ok(organizations)
    }

    async fn find_by_shortcode(&self, shortcode: &str) -> DomainResult<Option<Organization>> {
        let ids = self
            .store
            .find(
                EntityType::Organization,
                &[
                    Filter::eq("shortcode", shortcode),
                    Filter::eq("deleted_at", Value::Null),
                ],
            )
            .await?;

        match ids.first() {
            Some(id) => Ok(Some(self.load(*id).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use rust_decimal_macros::dec;

    fn repo() -> StoreOrganizationRepository {
        StoreOrganizationRepository::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(ChangeDispatcher::new()),
        )
    }

    fn acme() -> NewOrganization {
        NewOrganization {
            shortcode: "ACME".to_string(),
            name: "Acme Corp".to_string(),
            free_hours_limit: Some(dec!(4.0)),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = repo();
        let org = repo.create(&acme()).await.unwrap();
        assert_eq!(org.shortcode, "ACME");
        assert_eq!(org.free_hours_limit, Some(dec!(4.0)));

        let found = repo.find_by_shortcode("ACME").await.unwrap().unwrap();
        assert_eq!(found.id, org.id);
    }

    #[tokio::test]
    async fn test_duplicate_shortcode_rejected() {
        let repo = repo();
        repo.create(&acme()).await.unwrap();
        let err = repo.create(&acme()).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::Unique { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_clears_override() {
        let repo = repo();
        let org = repo.create(&acme()).await.unwrap();

        let update = UpdateOrganization {
            name: None,
            free_hours_limit: Some(None),
        };
        let updated = repo.update(org.id, &update).await.unwrap();
        assert_eq!(updated.free_hours_limit, None);
    }

    #[tokio::test]
    async fn test_soft_deleted_is_not_found() {
        let repo = repo();
        let org = repo.create(&acme()).await.unwrap();
        repo.soft_delete(org.id).await.unwrap();

        assert!(repo.find_by_id(org.id).await.is_err());
        assert!(repo.find_by_shortcode("ACME").await.unwrap().is_none());
        assert!(repo.find_all().await.unwrap().is_empty());
    }
}
