use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

use crate::errors::DomainResult;
use crate::store::fields;
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// Project status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Active,
    WaitingOnClient,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::WaitingOnClient => "waiting_on_client",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProjectStatus::Active),
            "waiting_on_client" => Some(ProjectStatus::WaitingOnClient),
            "on_hold" => Some(ProjectStatus::OnHold),
            "completed" => Some(ProjectStatus::Completed),
            "cancelled" => Some(ProjectStatus::Cancelled),
            _ => None,
        }
    }

    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::Active,
        ProjectStatus::WaitingOnClient,
        ProjectStatus::OnHold,
        ProjectStatus::Completed,
        ProjectStatus::Cancelled,
    ];
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Project entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub organization_id: EntityId,
    pub name: String,
    /// `PR-nnnn`, assigned once at creation and immutable thereafter.
    pub reference_number: Option<String>,
    pub status: ProjectStatus,
    /// Authoritative only while the project has no milestones.
    pub total_budget: Decimal,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn has_reference(&self) -> bool {
        self.reference_number
            .as_deref()
            .map(|r| !r.is_empty())
            .unwrap_or(false)
    }

    /// Map a raw store document onto the entity.
    pub fn from_fields(id: EntityId, map: &FieldMap) -> DomainResult<Self> {
        let status = fields::opt_str(map, "status")
            .and_then(ProjectStatus::from_str)
            .unwrap_or(ProjectStatus::Active);

        Ok(Self {
            id,
            organization_id: fields::req_id(EntityType::Project, map, "organization_id")?,
            name: fields::req_string(EntityType::Project, map, "name")?,
            reference_number: fields::opt_string(map, "reference_number"),
            status,
            total_budget: fields::opt_decimal(map, "total_budget").unwrap_or(Decimal::ZERO),
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// NewProject DTO - used when creating a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub organization_id: EntityId,
    pub name: String,
    pub status: ProjectStatus,
    pub total_budget: Decimal,
}

impl Validate for NewProject {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("organization_id", Some(self.organization_id))
            .valid_id()
            .validate()?;

        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .min_length(2)
            .max_length(200)
            .validate()?;

        ValidationBuilder::new("total_budget", Some(self.total_budget))
            .non_negative()
            .validate()?;

        Ok(())
    }
}

/// UpdateProject DTO - used when updating an existing project
///
/// The reference number is deliberately absent: it is assigned once by the
/// reference generator and never rewritten through updates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
    pub total_budget: Option<Decimal>,
}

impl Validate for UpdateProject {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .min_length(2)
                .max_length(200)
                .validate()?;
        }

        if let Some(budget) = self.total_budget {
            ValidationBuilder::new("total_budget", Some(budget))
                .non_negative()
                .validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trip() {
        for status in ProjectStatus::ALL {
            assert_eq!(ProjectStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ProjectStatus::from_str("archived"), None);
    }

    #[test]
    fn test_new_project_validation() {
        let valid = NewProject {
            organization_id: 1,
            name: "Website Relaunch".to_string(),
            status: ProjectStatus::Active,
            total_budget: dec!(15000),
        };
        assert!(valid.validate().is_ok());

        let bad = NewProject {
            organization_id: 0,
            ..valid
        };
        assert!(bad.validate().is_err());
    }
}
