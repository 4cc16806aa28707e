use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

use crate::errors::DomainResult;
use crate::store::fields;
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// Monthly report entity
///
/// Carries no foreign key to time entries: the association is the
/// organization plus the calendar month named in `report_month`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub id: EntityId,
    pub organization_id: EntityId,
    /// Human-readable month, e.g. `"November 2025"`.
    pub report_month: String,
    /// Free-hours override for this report; falls back to the
    /// organization's override, then the configured default.
    pub free_hours_limit: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MonthlyReport {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Map a raw store document onto the entity.
    pub fn from_fields(id: EntityId, map: &FieldMap) -> DomainResult<Self> {
        Ok(Self {
            id,
            organization_id: fields::req_id(EntityType::MonthlyReport, map, "organization_id")?,
            report_month: fields::req_string(EntityType::MonthlyReport, map, "report_month")?,
            free_hours_limit: fields::opt_decimal(map, "free_hours_limit"),
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// NewMonthlyReport DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMonthlyReport {
    pub organization_id: EntityId,
    pub report_month: String,
    pub free_hours_limit: Option<Decimal>,
}

impl Validate for NewMonthlyReport {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("organization_id", Some(self.organization_id))
            .valid_id()
            .validate()?;

        ValidationBuilder::new("report_month", Some(self.report_month.clone()))
            .required()
            .max_length(40)
            .validate()?;

        if let Some(limit) = self.free_hours_limit {
            ValidationBuilder::new("free_hours_limit", Some(limit))
                .non_negative()
                .validate()?;
        }

        Ok(())
    }
}

/// Free-hours usage for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeHoursProgress {
    pub used: Decimal,
    pub limit: Decimal,
    /// Capped at 100 for meters and bars.
    pub percent: Decimal,
    /// Uncapped; drives the color banding and overage display.
    pub percent_raw: Decimal,
    /// Hours left in the allowance, floored at zero.
    pub remaining: Decimal,
}

/// Progress meter color band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressColor {
    Blue,
    Yellow,
    Orange,
    Red,
}

impl ProgressColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressColor::Blue => "blue",
            ProgressColor::Yellow => "yellow",
            ProgressColor::Orange => "orange",
            ProgressColor::Red => "red",
        }
    }
}

impl fmt::Display for ProgressColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cached hour totals for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportHoursSummary {
    pub billable_hours: Decimal,
    pub total_hours: Decimal,
}
