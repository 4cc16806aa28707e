use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domains::core::repository::{HardDeletable, SoftDeletable};
use crate::domains::invoice::repository::InvoiceRepository;
use crate::domains::invoice::types::Invoice;
use crate::domains::milestone::repository::MilestoneRepository;
use crate::domains::milestone::types::{
    Milestone, NewMilestone, PaymentStatus, UpdateMilestone,
};
use crate::domains::project::repository::ProjectRepository;
use crate::errors::ServiceResult;
use crate::types::EntityId;
use crate::validation::Validate;

/// Derive a milestone's payment status from its linked invoices.
///
/// No invoices means nothing has been billed yet; once the paid totals
/// cover a non-zero milestone amount the milestone is paid, anything in
/// between is invoiced. The status is a pure function of durable state and
/// is never written back.
pub fn derive_payment_status(milestone: &Milestone, invoices: &[Invoice]) -> PaymentStatus {
    if invoices.is_empty() {
        return PaymentStatus::Pending;
    }

    let total_paid: Decimal = invoices.iter().map(|i| i.amount_paid).sum();
    if milestone.amount > Decimal::ZERO && total_paid >= milestone.amount {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Invoiced
    }
}

/// Trait defining milestone service operations
#[async_trait]
pub trait MilestoneService: Send + Sync {
    async fn create_milestone(&self, new_milestone: NewMilestone) -> ServiceResult<Milestone>;

    async fn get_milestone(&self, id: EntityId) -> ServiceResult<Milestone>;

    async fn update_milestone(
        &self,
        id: EntityId,
        update: UpdateMilestone,
    ) -> ServiceResult<Milestone>;

    async fn delete_milestone(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()>;

    async fn milestones_for_project(&self, project_id: EntityId) -> ServiceResult<Vec<Milestone>>;

    /// Recomputed from the linked invoices on every read.
    async fn payment_status(&self, id: EntityId) -> ServiceResult<PaymentStatus>;

    /// Sum of `amount_paid` across the milestone's invoices.
    async fn paid_total(&self, id: EntityId) -> ServiceResult<Decimal>;

    async fn invoice_count(&self, id: EntityId) -> ServiceResult<usize>;

    async fn is_paid(&self, id: EntityId) -> ServiceResult<bool>;

    async fn is_deposit(&self, id: EntityId) -> ServiceResult<bool>;

    /// `"{order} / {milestones in project}"`, e.g. `"1.5 / 4"`.
    async fn order_display(&self, id: EntityId) -> ServiceResult<String>;
}

/// Milestone service implementation
pub struct MilestoneServiceImpl {
    repo: Arc<dyn MilestoneRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    invoice_repo: Arc<dyn InvoiceRepository>,
}

impl MilestoneServiceImpl {
    pub fn new(
        repo: Arc<dyn MilestoneRepository>,
        project_repo: Arc<dyn ProjectRepository>,
        invoice_repo: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            repo,
            project_repo,
            invoice_repo,
        }
    }
}

#[async_trait]
impl MilestoneService for MilestoneServiceImpl {
    async fn create_milestone(&self, new_milestone: NewMilestone) -> ServiceResult<Milestone> {
        new_milestone.validate()?;
        // The parent project must be live.
        self.project_repo.find_by_id(new_milestone.project_id).await?;
        Ok(self.repo.create(&new_milestone).await?)
    }

    async fn get_milestone(&self, id: EntityId) -> ServiceResult<Milestone> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn update_milestone(
        &self,
        id: EntityId,
        update: UpdateMilestone,
    ) -> ServiceResult<Milestone> {
        update.validate()?;
        Ok(self.repo.update(id, &update).await?)
    }

    async fn delete_milestone(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()> {
        if hard_delete {
            self.repo.hard_delete(id).await?;
        } else {
            self.repo.soft_delete(id).await?;
        }
        Ok(())
    }

    async fn milestones_for_project(&self, project_id: EntityId) -> ServiceResult<Vec<Milestone>> {
        Ok(self.repo.find_by_project(project_id).await?)
    }

    async fn payment_status(&self, id: EntityId) -> ServiceResult<PaymentStatus> {
        let milestone = self.repo.find_by_id(id).await?;
        let invoices = self.invoice_repo.find_by_milestone(id).await?;
        Ok(derive_payment_status(&milestone, &invoices))
    }

    async fn paid_total(&self, id: EntityId) -> ServiceResult<Decimal> {
        let invoices = self.invoice_repo.find_by_milestone(id).await?;
        Ok(invoices.iter().map(|i| i.amount_paid).sum())
    }

    async fn invoice_count(&self, id: EntityId) -> ServiceResult<usize> {
        Ok(self.invoice_repo.find_by_milestone(id).await?.len())
    }

    async fn is_paid(&self, id: EntityId) -> ServiceResult<bool> {
        Ok(self.payment_status(id).await? == PaymentStatus::Paid)
    }

    async fn is_deposit(&self, id: EntityId) -> ServiceResult<bool> {
        Ok(self.repo.find_by_id(id).await?.is_deposit)
    }

    async fn order_display(&self, id: EntityId) -> ServiceResult<String> {
        let milestone = self.repo.find_by_id(id).await?;
        let total = self.repo.count_by_project(milestone.project_id).await?;
        let order = milestone
            .order
            .map(|o| o.normalize().to_string())
            .unwrap_or_else(|| "-".to_string());
        Ok(format!("{} / {}", order, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::milestone::types::WorkStatus;
    use rust_decimal_macros::dec;

    fn milestone(amount: Decimal) -> Milestone {
        Milestone {
            id: 1,
            project_id: 1,
            name: "Discovery".to_string(),
            order: Some(dec!(1)),
            reference_number: None,
            amount,
            work_status: WorkStatus::Planned,
            is_deposit: false,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    fn invoice(amount: Decimal, amount_paid: Decimal) -> Invoice {
        use crate::domains::invoice::types::InvoiceStatus;
        Invoice {
            id: 1,
            organization_id: 1,
            project_id: None,
            milestone_id: Some(1),
            amount,
            amount_paid,
            status: InvoiceStatus::Pending,
            due_date: None,
            issue_date: None,
            invoice_number: None,
            payment_date: None,
            payment_method: None,
            payment_transaction_id: None,
            payment_fee: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn test_no_invoices_is_pending() {
        assert_eq!(
            derive_payment_status(&milestone(dec!(1000)), &[]),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_unpaid_invoice_is_invoiced() {
        let invoices = vec![invoice(dec!(1000), dec!(0))];
        assert_eq!(
            derive_payment_status(&milestone(dec!(1000)), &invoices),
            PaymentStatus::Invoiced
        );
    }

    #[test]
    fn test_paid_totals_covering_amount_is_paid() {
        let invoices = vec![invoice(dec!(600), dec!(600)), invoice(dec!(400), dec!(400))];
        assert_eq!(
            derive_payment_status(&milestone(dec!(1000)), &invoices),
            PaymentStatus::Paid
        );
    }

    #[test]
    fn test_zero_amount_milestone_never_reads_paid() {
        let invoices = vec![invoice(dec!(100), dec!(100))];
        assert_eq!(
            derive_payment_status(&milestone(dec!(0)), &invoices),
            PaymentStatus::Invoiced
        );
    }

    #[test]
    fn test_status_is_monotonic_in_paid_total() {
        // As the paid total only increases, the status never regresses
        // from Paid back to Invoiced.
        let target = milestone(dec!(1000));
        let mut previously_paid = false;
        for paid in [0, 250, 500, 1000, 1000] {
            let invoices = vec![invoice(dec!(1000), Decimal::from(paid))];
            let status = derive_payment_status(&target, &invoices);
            if previously_paid {
                assert_eq!(status, PaymentStatus::Paid);
            }
            previously_paid = status == PaymentStatus::Paid;
        }
    }
}
