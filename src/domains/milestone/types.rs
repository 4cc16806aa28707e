use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

use crate::errors::DomainResult;
use crate::store::fields;
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// Milestone work status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkStatus {
    Planned,
    InProgress,
    OnHold,
    WaitingForClient,
    Completed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Planned => "planned",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::OnHold => "on_hold",
            WorkStatus::WaitingForClient => "waiting_for_client",
            WorkStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(WorkStatus::Planned),
            "in_progress" => Some(WorkStatus::InProgress),
            "on_hold" => Some(WorkStatus::OnHold),
            "waiting_for_client" => Some(WorkStatus::WaitingForClient),
            "completed" => Some(WorkStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Milestone payment status - derived, never stored.
///
/// Recomputed from the linked invoices on every read; see the milestone
/// service for the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Invoiced,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Invoiced => "invoiced",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Milestone entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: EntityId,
    pub project_id: EntityId,
    pub name: String,
    /// Sequencing within the project; fractional orders slot milestones
    /// between existing ones (1, 1.5, 2).
    pub order: Option<Decimal>,
    /// `{project_ref}-{order}`, assigned once the parent has a reference.
    pub reference_number: Option<String>,
    pub amount: Decimal,
    pub work_status: WorkStatus,
    pub is_deposit: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Milestone {
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
        let work_status = fields::opt_str(map, "work_status")
            .and_then(WorkStatus::from_str)
            .unwrap_or(WorkStatus::Planned);

        Ok(Self {
            id,
            project_id: fields::req_id(EntityType::Milestone, map, "project_id")?,
            name: fields::req_string(EntityType::Milestone, map, "name")?,
            order: fields::opt_decimal(map, "order"),
            reference_number: fields::opt_string(map, "reference_number"),
            amount: fields::opt_decimal(map, "amount").unwrap_or(Decimal::ZERO),
            work_status,
            is_deposit: fields::opt_bool(map, "is_deposit").unwrap_or(false),
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// NewMilestone DTO - used when creating a new milestone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMilestone {
    pub project_id: EntityId,
    pub name: String,
    pub order: Decimal,
    pub amount: Decimal,
    pub work_status: WorkStatus,
    pub is_deposit: bool,
}

impl Validate for NewMilestone {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("project_id", Some(self.project_id))
            .valid_id()
            .validate()?;

        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .min_length(2)
            .max_length(200)
            .validate()?;

        ValidationBuilder::new("order", Some(self.order))
            .positive()
            .validate()?;

        ValidationBuilder::new("amount", Some(self.amount))
            .non_negative()
            .validate()?;

        Ok(())
    }
}

/// UpdateMilestone DTO - used when updating an existing milestone
///
/// Neither `order` nor the reference number is updatable: both are burned
/// into the milestone's reference once assigned.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMilestone {
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub work_status: Option<WorkStatus>,
    pub is_deposit: Option<bool>,
}

impl Validate for UpdateMilestone {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .min_length(2)
                .max_length(200)
                .validate()?;
        }

        if let Some(amount) = self.amount {
            ValidationBuilder::new("amount", Some(amount))
                .non_negative()
                .validate()?;
        }

        Ok(())
    }
}
