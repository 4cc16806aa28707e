use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::domains::core::hooks::ChangeListener;
use crate::domains::invoice::repository::InvoiceRepository;
use crate::domains::milestone::repository::MilestoneRepository;
use crate::domains::project::repository::ProjectRepository;
use crate::errors::DomainResult;
use crate::store::EntityType;
use crate::types::{ChangeEvent, ChangeKind, ChangeOrigin, EntityId};

const PROJECT_PREFIX: &str = "PR-";
const INVOICE_PREFIX: &str = "INV-";

/// Assigns immutable sequential reference numbers to projects, milestones
/// and invoices.
///
/// Generators are scan-max: take the highest existing numeric suffix under
/// the prefix and add one. The scan-then-persist step runs under a
/// single-writer mutex, so two concurrent creations cannot read the same
/// high-water mark and assign duplicate references.
pub struct ReferenceService {
    projects: Arc<dyn ProjectRepository>,
    milestones: Arc<dyn MilestoneRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    assign_lock: Mutex<()>,
}

/// Highest numeric suffix among references carrying `prefix`.
///
/// Suffixes that are not purely numeric (milestone-style extensions) are
/// ignored.
fn max_suffix(references: &[String], prefix: &str) -> u32 {
    references
        .iter()
        .filter_map(|reference| reference.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Format a milestone reference from its parent's reference and the
/// milestone's order.
///
/// The integer part is zero-padded to two digits; a non-zero fractional
/// part is appended verbatim with the leading zero stripped:
/// order `1` gives `PR-0001-01`, order `1.5` gives `PR-0001-01.5`.
pub fn format_milestone_reference(project_reference: &str, order: Decimal) -> String {
    use rust_decimal::prelude::ToPrimitive;

    let whole = order.trunc().to_i64().unwrap_or(0);
    let fraction = order.fract().normalize();

    let mut formatted = format!("{:02}", whole);
    if !fraction.is_zero() {
        let fraction = fraction.to_string();
        formatted.push_str(fraction.trim_start_matches('0'));
    }
    format!("{}-{}", project_reference, formatted)
}

impl ReferenceService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        milestones: Arc<dyn MilestoneRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            projects,
            milestones,
            invoices,
            assign_lock: Mutex::new(()),
        }
    }

    /// Next free project reference, `PR-0001` when none exist yet.
    ///
    /// Callers that persist the result must hold the assignment lock; the
    /// bare scan is only race-free for display purposes.
    pub async fn next_project_reference(&self) -> DomainResult<String> {
        let references = self.projects.all_reference_numbers().await?;
        let next = max_suffix(&references, PROJECT_PREFIX) + 1;
        Ok(format!("{}{:04}", PROJECT_PREFIX, next))
    }

    /// Next free invoice number, `INV-0001` when none exist yet.
    pub async fn next_invoice_number(&self) -> DomainResult<String> {
        let numbers = self.invoices.all_invoice_numbers().await?;
        let next = max_suffix(&numbers, INVOICE_PREFIX) + 1;
        Ok(format!("{}{:04}", INVOICE_PREFIX, next))
    }

    /// Assign the next project reference; a no-op when one is already set.
    pub async fn assign_project_reference(&self, id: EntityId) -> DomainResult<()> {
        let _guard = self.assign_lock.lock().await;

        let project = self.projects.find_by_id(id).await?;
        if project.has_reference() {
            log::debug!(
                "Project {} already holds reference {:?}, skipping assignment",
                id,
                project.reference_number
            );
            return Ok(());
        }

        let reference = self.next_project_reference().await?;
        self.projects.set_reference(id, &reference).await?;
        log::info!("Assigned reference {} to project {}", reference, id);
        Ok(())
    }

    /// Assign a milestone its reference from the parent project's.
    ///
    /// A milestone reference can only exist once its project has one; when
    /// the parent reference or the milestone's order is missing, the
    /// assignment is logged and skipped so a later save can retry.
    pub async fn assign_milestone_reference(&self, id: EntityId) -> DomainResult<()> {
        let milestone = self.milestones.find_by_id(id).await?;
        if milestone.has_reference() {
            log::debug!(
                "Milestone {} already holds reference {:?}, skipping assignment",
                id,
                milestone.reference_number
            );
            return Ok(());
        }

        let order = match milestone.order {
            Some(order) => order,
            None => {
                log::warn!("Milestone {} has no order set, cannot assign reference", id);
                return Ok(());
            }
        };

        let project = self.projects.find_by_id(milestone.project_id).await?;
        let project_reference = match project.reference_number.as_deref() {
            Some(reference) if !reference.is_empty() => reference.to_string(),
            _ => {
                log::warn!(
                    "Project {} has no reference yet, cannot assign one to milestone {}",
                    milestone.project_id,
                    id
                );
                return Ok(());
            }
        };

        let reference = format_milestone_reference(&project_reference, order);
        self.milestones.set_reference(id, &reference).await?;
        log::info!("Assigned reference {} to milestone {}", reference, id);
        Ok(())
    }

    /// Assign the next invoice number; a no-op when one is already set.
    pub async fn assign_invoice_number(&self, id: EntityId) -> DomainResult<()> {
        let _guard = self.assign_lock.lock().await;

        let invoice = self.invoices.find_by_id(id).await?;
        if invoice.has_invoice_number() {
            log::debug!(
                "Invoice {} already holds number {:?}, skipping assignment",
                id,
                invoice.invoice_number
            );
            return Ok(());
        }

        let number = self.next_invoice_number().await?;
        self.invoices.set_invoice_number(id, &number).await?;
        log::info!("Assigned number {} to invoice {}", number, id);
        Ok(())
    }
}

/// Creation hook: number new projects, milestones and invoices.
///
/// Only user-originated creations trigger assignment; the service's own
/// reference-sync writes come back through the dispatcher and are ignored
/// here, which is what keeps the hook from re-entering itself.
#[async_trait]
impl ChangeListener for ReferenceService {
    async fn on_change(&self, event: &ChangeEvent) {
        if event.origin != ChangeOrigin::Edit || event.kind != ChangeKind::Created {
            return;
        }

        let result = match event.entity_type {
            EntityType::Project => self.assign_project_reference(event.id).await,
            EntityType::Milestone => self.assign_milestone_reference(event.id).await,
            EntityType::Invoice => self.assign_invoice_number(event.id).await,
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::error!(
                "Reference assignment failed for {} {}: {}",
                event.entity_type,
                event.id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::hooks::ChangeDispatcher;
    use crate::domains::core::repository::FindById;
    use crate::domains::invoice::repository::StoreInvoiceRepository;
    use crate::domains::invoice::types::{InvoiceStatus, NewInvoice};
    use crate::domains::milestone::repository::StoreMilestoneRepository;
    use crate::domains::milestone::types::{NewMilestone, WorkStatus};
    use crate::domains::project::repository::StoreProjectRepository;
    use crate::domains::project::types::{NewProject, ProjectStatus};
    use crate::store::MemoryObjectStore;
    use rust_decimal_macros::dec;

    struct Fixture {
        projects: Arc<StoreProjectRepository>,
        milestones: Arc<StoreMilestoneRepository>,
        invoices: Arc<StoreInvoiceRepository>,
        service: ReferenceService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryObjectStore::new());
        let dispatcher = Arc::new(ChangeDispatcher::new());
        let projects = Arc::new(StoreProjectRepository::new(store.clone(), dispatcher.clone()));
        let milestones = Arc::new(StoreMilestoneRepository::new(store.clone(), dispatcher.clone()));
        let invoices = Arc::new(StoreInvoiceRepository::new(store, dispatcher));
        let service = ReferenceService::new(
            projects.clone(),
            milestones.clone(),
            invoices.clone(),
        );
        Fixture {
            projects,
            milestones,
            invoices,
            service,
        }
    }

    fn new_project() -> NewProject {
        NewProject {
            organization_id: 1,
            name: "Website Relaunch".to_string(),
            status: ProjectStatus::Active,
            total_budget: dec!(0),
        }
    }

    fn new_milestone(project_id: EntityId, order: Decimal) -> NewMilestone {
        NewMilestone {
            project_id,
            name: "Discovery".to_string(),
            order,
            amount: dec!(1000),
            work_status: WorkStatus::Planned,
            is_deposit: false,
        }
    }

    #[test]
    fn test_milestone_reference_formatting() {
        assert_eq!(format_milestone_reference("PR-0001", dec!(1)), "PR-0001-01");
        assert_eq!(format_milestone_reference("PR-0001", dec!(1.5)), "PR-0001-01.5");
        assert_eq!(format_milestone_reference("PR-0001", dec!(10)), "PR-0001-10");
        assert_eq!(format_milestone_reference("PR-0001", dec!(2)), "PR-0001-02");
    }

    #[tokio::test]
    async fn test_project_references_are_sequential_and_gap_free() {
        let f = fixture();
        for expected in 1..=5u32 {
            let project = f.projects.create(&new_project()).await.unwrap();
            f.service.assign_project_reference(project.id).await.unwrap();
            let project = f.projects.find_by_id(project.id).await.unwrap();
            assert_eq!(
                project.reference_number.as_deref(),
                Some(format!("PR-{:04}", expected).as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_assignment_is_idempotent() {
        let f = fixture();
        let project = f.projects.create(&new_project()).await.unwrap();
        f.service.assign_project_reference(project.id).await.unwrap();
        f.service.assign_project_reference(project.id).await.unwrap();

        let project = f.projects.find_by_id(project.id).await.unwrap();
        assert_eq!(project.reference_number.as_deref(), Some("PR-0001"));
    }

    #[tokio::test]
    async fn test_milestone_reference_extends_project_reference() {
        let f = fixture();
        let project = f.projects.create(&new_project()).await.unwrap();
        f.service.assign_project_reference(project.id).await.unwrap();

        let milestone = f
            .milestones
            .create(&new_milestone(project.id, dec!(1.5)))
            .await
            .unwrap();
        f.service.assign_milestone_reference(milestone.id).await.unwrap();

        let milestone = f.milestones.find_by_id(milestone.id).await.unwrap();
        assert_eq!(milestone.reference_number.as_deref(), Some("PR-0001-01.5"));
    }

    #[tokio::test]
    async fn test_milestone_skipped_until_project_has_reference() {
        let f = fixture();
        let project = f.projects.create(&new_project()).await.unwrap();
        let milestone = f
            .milestones
            .create(&new_milestone(project.id, dec!(1)))
            .await
            .unwrap();

        // Parent has no reference yet: logged and skipped, not an error.
        f.service.assign_milestone_reference(milestone.id).await.unwrap();
        assert!(!f.milestones.find_by_id(milestone.id).await.unwrap().has_reference());

        // Retry succeeds once the parent is numbered.
        f.service.assign_project_reference(project.id).await.unwrap();
        f.service.assign_milestone_reference(milestone.id).await.unwrap();
        let milestone = f.milestones.find_by_id(milestone.id).await.unwrap();
        assert_eq!(milestone.reference_number.as_deref(), Some("PR-0001-01"));
    }

    #[tokio::test]
    async fn test_invoice_numbers_are_sequential() {
        let f = fixture();
        for expected in 1..=3u32 {
            let invoice = f
                .invoices
                .create(&NewInvoice {
                    organization_id: 1,
                    project_id: None,
                    milestone_id: None,
                    amount: dec!(100),
                    status: InvoiceStatus::Draft,
                    due_date: None,
                    issue_date: None,
                })
                .await
                .unwrap();
            f.service.assign_invoice_number(invoice.id).await.unwrap();
            let invoice = f.invoices.find_by_id(invoice.id).await.unwrap();
            assert_eq!(
                invoice.invoice_number.as_deref(),
                Some(format!("INV-{:04}", expected).as_str())
            );
        }
    }
}
