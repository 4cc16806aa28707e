use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::errors::DomainResult;
use crate::store::fields;
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// Service request status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Resolved => "resolved",
            RequestStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(RequestStatus::Open),
            "in_progress" => Some(RequestStatus::InProgress),
            "resolved" => Some(RequestStatus::Resolved),
            "closed" => Some(RequestStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Service request entity - carrier of support-hour time entries.
///
/// Monthly reports reach time entries through the organization's service
/// requests, so reassigning a request to another organization retroactively
/// moves its hours between reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: EntityId,
    pub organization_id: EntityId,
    pub title: String,
    pub status: RequestStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Map a raw store document onto the entity.
    pub fn from_fields(id: EntityId, map: &FieldMap) -> DomainResult<Self> {
        let status = fields::opt_str(map, "status")
            .and_then(RequestStatus::from_str)
            .unwrap_or(RequestStatus::Open);

        Ok(Self {
            id,
            organization_id: fields::req_id(EntityType::ServiceRequest, map, "organization_id")?,
            title: fields::req_string(EntityType::ServiceRequest, map, "title")?,
            status,
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// NewServiceRequest DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewServiceRequest {
    pub organization_id: EntityId,
    pub title: String,
    pub status: RequestStatus,
}

impl Validate for NewServiceRequest {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("organization_id", Some(self.organization_id))
            .valid_id()
            .validate()?;

        ValidationBuilder::new("title", Some(self.title.clone()))
            .required()
            .min_length(2)
            .max_length(300)
            .validate()?;

        Ok(())
    }
}
