use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

use crate::errors::DomainResult;
use crate::store::fields;
use crate::store::{EntityType, FieldMap};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// Stored invoice status enum.
///
/// `Overdue` can be persisted by hand, but on reads it is re-derived from
/// the due date; see [`Invoice::effective_status_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Partial,
    Paid,
    Overdue,
    Void,
    Credited,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Void => "void",
            InvoiceStatus::Credited => "credited",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "pending" => Some(InvoiceStatus::Pending),
            "partial" => Some(InvoiceStatus::Partial),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "void" => Some(InvoiceStatus::Void),
            "credited" => Some(InvoiceStatus::Credited),
            _ => None,
        }
    }

    /// Void and Credited are terminal; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Void | InvoiceStatus::Credited)
    }

    /// Statuses that settle or cancel the balance; these never show as
    /// overdue regardless of due date.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Paid | InvoiceStatus::Void | InvoiceStatus::Credited
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Line item type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineType {
    Service,
    Support,
    Expense,
    Discount,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Service => "service",
            LineType::Support => "support",
            LineType::Expense => "expense",
            LineType::Discount => "discount",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "service" => Some(LineType::Service),
            "support" => Some(LineType::Support),
            "expense" => Some(LineType::Expense),
            "discount" => Some(LineType::Discount),
            _ => None,
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: EntityId,
    pub organization_id: EntityId,
    /// Project-direct scope; mutually exclusive with `milestone_id`.
    pub project_id: Option<EntityId>,
    pub milestone_id: Option<EntityId>,
    pub amount: Decimal,
    /// Running total of recorded payments; never exceeds `amount` through
    /// the payment-recording path.
    pub amount_paid: Decimal,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    /// `INV-nnnn`, immutable once assigned.
    pub invoice_number: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub payment_fee: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn has_invoice_number(&self) -> bool {
        self.invoice_number
            .as_deref()
            .map(|n| !n.is_empty())
            .unwrap_or(false)
    }

    /// Outstanding balance, floored at zero.
    pub fn balance(&self) -> Decimal {
        (self.amount - self.amount_paid).max(Decimal::ZERO)
    }

    /// Whether the invoice reads as overdue on the given calendar day.
    ///
    /// Settled statuses never show overdue; an invoice without a due date
    /// cannot be late.
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        if self.status.is_settled() {
            return false;
        }
        match self.due_date {
            Some(due_date) => due_date < today,
            None => false,
        }
    }

    /// Display-time status: the stored status with `Overdue` derived on
    /// top. Only `record_payment` persists the Paid/Partial transitions;
    /// this override is never written back.
    pub fn effective_status_on(&self, today: NaiveDate) -> InvoiceStatus {
        if self.is_overdue_on(today) {
            InvoiceStatus::Overdue
        } else {
            self.status
        }
    }

    /// Map a raw store document onto the entity.
    pub fn from_fields(id: EntityId, map: &FieldMap) -> DomainResult<Self> {
        let status = fields::opt_str(map, "status")
            .and_then(InvoiceStatus::from_str)
            .unwrap_or(InvoiceStatus::Draft);

        Ok(Self {
            id,
            organization_id: fields::req_id(EntityType::Invoice, map, "organization_id")?,
            project_id: fields::opt_id(map, "project_id"),
            milestone_id: fields::opt_id(map, "milestone_id"),
            amount: fields::opt_decimal(map, "amount").unwrap_or(Decimal::ZERO),
            amount_paid: fields::opt_decimal(map, "amount_paid").unwrap_or(Decimal::ZERO),
            status,
            due_date: fields::opt_date(map, "due_date"),
            issue_date: fields::opt_date(map, "issue_date"),
            invoice_number: fields::opt_string(map, "invoice_number"),
            payment_date: fields::opt_date(map, "payment_date"),
            payment_method: fields::opt_string(map, "payment_method"),
            payment_transaction_id: fields::opt_string(map, "payment_transaction_id"),
            payment_fee: fields::opt_decimal(map, "payment_fee"),
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// Invoice line item entity - cascades delete/trash with its invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: EntityId,
    pub invoice_id: EntityId,
    pub line_type: LineType,
    pub description: String,
    pub amount: Decimal,
    /// Hours, for Support-type lines.
    pub quantity: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl InvoiceLineItem {
    pub fn from_fields(id: EntityId, map: &FieldMap) -> DomainResult<Self> {
        let line_type = fields::opt_str(map, "line_type")
            .and_then(LineType::from_str)
            .unwrap_or(LineType::Service);

        Ok(Self {
            id,
            invoice_id: fields::req_id(EntityType::InvoiceLineItem, map, "invoice_id")?,
            line_type,
            description: fields::opt_string(map, "description").unwrap_or_default(),
            amount: fields::opt_decimal(map, "amount").unwrap_or(Decimal::ZERO),
            quantity: fields::opt_decimal(map, "quantity"),
            created_at: fields::opt_datetime(map, "created_at"),
            updated_at: fields::opt_datetime(map, "updated_at"),
            deleted_at: fields::opt_datetime(map, "deleted_at"),
        })
    }
}

/// NewInvoice DTO - used when creating a new invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub organization_id: EntityId,
    pub project_id: Option<EntityId>,
    pub milestone_id: Option<EntityId>,
    pub amount: Decimal,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
}

impl Validate for NewInvoice {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("organization_id", Some(self.organization_id))
            .valid_id()
            .validate()?;

        // An invoice has at most one owning scope.
        if self.project_id.is_some() && self.milestone_id.is_some() {
            return Err(crate::errors::ValidationError::relationship(
                "an invoice is scoped to either a project or a milestone, not both",
            )
            .into());
        }

        if let Some(project_id) = self.project_id {
            ValidationBuilder::new("project_id", Some(project_id))
                .valid_id()
                .validate()?;
        }
        if let Some(milestone_id) = self.milestone_id {
            ValidationBuilder::new("milestone_id", Some(milestone_id))
                .valid_id()
                .validate()?;
        }

        ValidationBuilder::new("amount", Some(self.amount))
            .non_negative()
            .validate()?;

        Ok(())
    }
}

/// NewInvoiceLineItem DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoiceLineItem {
    pub invoice_id: EntityId,
    pub line_type: LineType,
    pub description: String,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
}

impl Validate for NewInvoiceLineItem {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("invoice_id", Some(self.invoice_id))
            .valid_id()
            .validate()?;

        ValidationBuilder::new("description", Some(self.description.clone()))
            .required()
            .max_length(500)
            .validate()?;

        if let Some(quantity) = self.quantity {
            ValidationBuilder::new("quantity", Some(quantity))
                .non_negative()
                .validate()?;
        }

        Ok(())
    }
}

/// UpdateInvoice DTO - manual edits and status transitions
///
/// Payment-derived fields (`amount_paid`, `payment_*`) are absent on
/// purpose; they only move through the payment-recording operation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateInvoice {
    pub amount: Option<Decimal>,
    pub status: Option<InvoiceStatus>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl Validate for UpdateInvoice {
    fn validate(&self) -> DomainResult<()> {
        if let Some(amount) = self.amount {
            ValidationBuilder::new("amount", Some(amount))
                .non_negative()
                .validate()?;
        }
        Ok(())
    }
}

/// Optional metadata recorded alongside a payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentMeta {
    pub method: Option<String>,
    pub transaction_id: Option<String>,
    pub processing_fee: Option<Decimal>,
}
