use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;

use crate::cache::{keys, remember, Cache};
use crate::config::EngineConfig;
use crate::domains::core::repository::{HardDeletable, SoftDeletable};
use crate::domains::invoice::repository::InvoiceRepository;
use crate::domains::invoice::types::{
    Invoice, InvoiceLineItem, InvoiceStatus, LineType, NewInvoice, NewInvoiceLineItem,
    PaymentMeta, UpdateInvoice,
};
use crate::domains::milestone::repository::MilestoneRepository;
use crate::errors::{ServiceResult, ValidationError};
use crate::types::EntityId;
use crate::validation::{Validate, ValidationBuilder};

/// Trait defining invoice service operations
#[async_trait]
pub trait InvoiceService: Send + Sync {
    async fn create_invoice(&self, new_invoice: NewInvoice) -> ServiceResult<Invoice>;

    async fn get_invoice(&self, id: EntityId) -> ServiceResult<Invoice>;

    async fn update_invoice(&self, id: EntityId, update: UpdateInvoice) -> ServiceResult<Invoice>;

    async fn delete_invoice(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()>;

    async fn add_line_item(&self, new_item: NewInvoiceLineItem) -> ServiceResult<InvoiceLineItem>;

    async fn line_items(&self, invoice_id: EntityId) -> ServiceResult<Vec<InvoiceLineItem>>;

    /// Hours billed on Support-type lines.
    async fn support_hours(&self, invoice_id: EntityId) -> ServiceResult<Decimal>;

    /// Outstanding balance, floored at zero.
    async fn balance(&self, id: EntityId) -> ServiceResult<Decimal>;

    /// Overdue is evaluated fresh against the local calendar date; the
    /// stored status is never rewritten by a read.
    async fn is_overdue(&self, id: EntityId) -> ServiceResult<bool>;

    /// The status exactly as persisted.
    async fn stored_status(&self, id: EntityId) -> ServiceResult<InvoiceStatus>;

    /// The stored status with the overdue override applied on top.
    async fn effective_status(&self, id: EntityId) -> ServiceResult<InvoiceStatus>;

    /// The only path that mutates payment-derived state.
    async fn record_payment(
        &self,
        id: EntityId,
        amount: Decimal,
        meta: PaymentMeta,
    ) -> ServiceResult<Invoice>;

    /// Invoices reachable from a project, directly or via its milestones,
    /// de-duplicated, newest first.
    async fn invoices_for_project(&self, project_id: EntityId) -> ServiceResult<Vec<Invoice>>;

    async fn total_invoiced_for_project(&self, project_id: EntityId) -> ServiceResult<Decimal>;

    async fn total_paid_for_project(&self, project_id: EntityId) -> ServiceResult<Decimal>;

    async fn invoices_for_organization(
        &self,
        organization_id: EntityId,
    ) -> ServiceResult<Vec<Invoice>>;

    async fn pending_invoices(&self, organization_id: EntityId) -> ServiceResult<Vec<Invoice>>;
}

/// Invoice service implementation
pub struct InvoiceServiceImpl {
    repo: Arc<dyn InvoiceRepository>,
    milestone_repo: Arc<dyn MilestoneRepository>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl InvoiceServiceImpl {
    pub fn new(
        repo: Arc<dyn InvoiceRepository>,
        milestone_repo: Arc<dyn MilestoneRepository>,
        cache: Arc<dyn Cache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repo,
            milestone_repo,
            cache,
            cache_ttl: config.cache_ttl,
        }
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[async_trait]
impl InvoiceService for InvoiceServiceImpl {
    async fn create_invoice(&self, new_invoice: NewInvoice) -> ServiceResult<Invoice> {
        new_invoice.validate()?;
        if let Some(milestone_id) = new_invoice.milestone_id {
            // The milestone scope must be live.
            self.milestone_repo.find_by_id(milestone_id).await?;
        }
        Ok(self.repo.create(&new_invoice).await?)
    }

    async fn get_invoice(&self, id: EntityId) -> ServiceResult<Invoice> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn update_invoice(&self, id: EntityId, update: UpdateInvoice) -> ServiceResult<Invoice> {
        update.validate()?;
        Ok(self.repo.update(id, &update).await?)
    }

    async fn delete_invoice(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()> {
        if hard_delete {
            self.repo.hard_delete(id).await?;
        } else {
            self.repo.soft_delete(id).await?;
        }
        Ok(())
    }

    async fn add_line_item(&self, new_item: NewInvoiceLineItem) -> ServiceResult<InvoiceLineItem> {
        new_item.validate()?;
        Ok(self.repo.create_line_item(&new_item).await?)
    }

    async fn line_items(&self, invoice_id: EntityId) -> ServiceResult<Vec<InvoiceLineItem>> {
        Ok(self.repo.line_items_for_invoice(invoice_id).await?)
    }

    async fn support_hours(&self, invoice_id: EntityId) -> ServiceResult<Decimal> {
        let items = self.repo.line_items_for_invoice(invoice_id).await?;
        Ok(items
            .iter()
            .filter(|item| item.line_type == LineType::Support)
            .filter_map(|item| item.quantity)
            .sum())
    }

    async fn balance(&self, id: EntityId) -> ServiceResult<Decimal> {
        Ok(self.repo.find_by_id(id).await?.balance())
    }

    async fn is_overdue(&self, id: EntityId) -> ServiceResult<bool> {
        Ok(self.repo.find_by_id(id).await?.is_overdue_on(self.today()))
    }

    async fn stored_status(&self, id: EntityId) -> ServiceResult<InvoiceStatus> {
        Ok(self.repo.find_by_id(id).await?.status)
    }

    async fn effective_status(&self, id: EntityId) -> ServiceResult<InvoiceStatus> {
        Ok(self.repo.find_by_id(id).await?.effective_status_on(self.today()))
    }

    async fn record_payment(
        &self,
        id: EntityId,
        amount: Decimal,
        meta: PaymentMeta,
    ) -> ServiceResult<Invoice> {
        ValidationBuilder::new("amount", Some(amount))
            .positive()
            .validate()?;

        let invoice = self.repo.find_by_id(id).await?;
        if invoice.status.is_terminal() {
            return Err(ValidationError::invalid_value(
                "status",
                "cannot record a payment on a void or credited invoice",
            )
            .into());
        }

        let new_total = invoice.amount_paid + amount;
        if new_total > invoice.amount {
            return Err(ValidationError::invalid_value(
                "amount",
                "payment would exceed the invoice amount",
            )
            .into());
        }

        let (status, payment_date) = if new_total >= invoice.amount {
            (InvoiceStatus::Paid, Some(self.today()))
        } else {
            (InvoiceStatus::Partial, None)
        };

        log::info!(
            "Recording payment of {} on invoice {} ({} -> {})",
            amount,
            id,
            invoice.status,
            status
        );
        Ok(self
            .repo
            .apply_payment(id, new_total, status, payment_date, &meta)
            .await?)
    }

    async fn invoices_for_project(&self, project_id: EntityId) -> ServiceResult<Vec<Invoice>> {
        let mut invoices = self.repo.find_by_project_direct(project_id).await?;

        let milestones = self.milestone_repo.find_by_project(project_id).await?;
        let linked = futures::future::try_join_all(
            milestones
                .iter()
                .map(|milestone| self.repo.find_by_milestone(milestone.id)),
        )
        .await?;
        invoices.extend(linked.into_iter().flatten());

        let mut seen = HashSet::new();
        invoices.retain(|invoice| seen.insert(invoice.id));
        invoices.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        Ok(invoices)
    }

    async fn total_invoiced_for_project(&self, project_id: EntityId) -> ServiceResult<Decimal> {
        let invoices = self.invoices_for_project(project_id).await?;
        Ok(invoices.iter().map(|i| i.amount).sum())
    }

    async fn total_paid_for_project(&self, project_id: EntityId) -> ServiceResult<Decimal> {
        let invoices = self.invoices_for_project(project_id).await?;
        Ok(invoices.iter().map(|i| i.amount_paid).sum())
    }

    async fn invoices_for_organization(
        &self,
        organization_id: EntityId,
    ) -> ServiceResult<Vec<Invoice>> {
        let key = keys::invoice_list(organization_id);
        let invoices = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            self.repo.find_by_organization(organization_id).await
        })
        .await?;
        Ok(invoices)
    }

    async fn pending_invoices(&self, organization_id: EntityId) -> ServiceResult<Vec<Invoice>> {
        let key = keys::pending_invoices(organization_id);
        let invoices = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            self.repo.find_pending_by_organization(organization_id).await
        })
        .await?;
        Ok(invoices)
    }
}
