use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

use crate::errors::DomainResult;
use crate::store::fields;
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// Organization entity - the root of all client-scoped data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: EntityId,
    /// Short unique client code, e.g. `ACME`.
    pub shortcode: String,
    pub name: String,
    /// Monthly free support hours override; falls back to the configured
    /// default when unset.
    pub free_hours_limit: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Organization {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Map a raw store document onto the entity.
    pub fn from_fields(id: EntityId, map: &FieldMap) -> DomainResult<Self> {
        Ok(Self {
            id,
            shortcode: fields::req_string(EntityType::Organization, map, "shortcode")?,
            name: fields::req_string(EntityType::Organization, map, "name")?,
            free_hours_limit: fields::opt_decimal(map, "free_hours_limit"),
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// NewOrganization DTO - used when creating a new organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrganization {
    pub shortcode: String,
    pub name: String,
    pub free_hours_limit: Option<Decimal>,
}

impl Validate for NewOrganization {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("shortcode", Some(self.shortcode.clone()))
            .required()
            .shortcode()
            .validate()?;

        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .min_length(2)
            .max_length(200)
            .validate()?;

        if let Some(limit) = self.free_hours_limit {
            ValidationBuilder::new("free_hours_limit", Some(limit))
                .non_negative()
                .validate()?;
        }

        Ok(())
    }
}

/// UpdateOrganization DTO - used when updating an existing organization
///
/// `free_hours_limit` is doubly optional: `Some(None)` clears the override.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub free_hours_limit: Option<Option<Decimal>>,
}

impl Validate for UpdateOrganization {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .min_length(2)
                .max_length(200)
                .validate()?;
        }

        if let Some(Some(limit)) = self.free_hours_limit {
            ValidationBuilder::new("free_hours_limit", Some(limit))
                .non_negative()
                .validate()?;
        }

        Ok(())
    }
}
