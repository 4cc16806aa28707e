use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

use crate::errors::DomainResult;
use crate::store::fields;
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// What a time entry was logged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeEntryScope {
    ServiceRequest(EntityId),
    Project(EntityId),
    Milestone(EntityId),
}

/// Time entry entity
///
/// Exactly one scope link is set; the scope decides which hour rollups and
/// monthly reports the entry feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: EntityId,
    pub hours: Decimal,
    pub entry_date: NaiveDate,
    pub billable: bool,
    pub description: Option<String>,
    pub related_service_request: Option<EntityId>,
    pub related_project: Option<EntityId>,
    pub related_milestone: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TimeEntry {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn scope(&self) -> Option<TimeEntryScope> {
        if let Some(id) = self.related_service_request {
            Some(TimeEntryScope::ServiceRequest(id))
        } else if let Some(id) = self.related_project {
            Some(TimeEntryScope::Project(id))
        } else {
            self.related_milestone.map(TimeEntryScope::Milestone)
        }
    }

    /// Map a raw store document onto the entity.
    pub fn from_fields(id: EntityId, map: &FieldMap) -> DomainResult<Self> {
        Ok(Self {
            id,
            hours: fields::req_decimal(EntityType::TimeEntry, map, "hours")?,
            entry_date: fields::req_date(EntityType::TimeEntry, map, "entry_date")?,
            billable: fields::opt_bool(map, "billable").unwrap_or(true),
            description: fields::opt_string(map, "description"),
            related_service_request: fields::opt_id(map, "related_service_request"),
            related_project: fields::opt_id(map, "related_project"),
            related_milestone: fields::opt_id(map, "related_milestone"),
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// NewTimeEntry DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTimeEntry {
    pub hours: Decimal,
    pub entry_date: NaiveDate,
    pub billable: bool,
    pub description: Option<String>,
    pub scope: TimeEntryScope,
}

impl Validate for NewTimeEntry {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("hours", Some(self.hours))
            .positive()
            .max_value(Decimal::from(24))
            .validate()?;

        let scope_id = match self.scope {
            TimeEntryScope::ServiceRequest(id)
            | TimeEntryScope::Project(id)
            | TimeEntryScope::Milestone(id) => id,
        };
        ValidationBuilder::new("scope", Some(scope_id))
            .valid_id()
            .validate()?;

        Ok(())
    }
}
