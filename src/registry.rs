use std::sync::Arc;

use crate::cache::{Cache, InvalidationRouter, MemoryCache};
use crate::config::EngineConfig;
use crate::domains::core::hooks::ChangeDispatcher;
use crate::domains::core::reference_service::ReferenceService;
use crate::domains::invoice::repository::{InvoiceRepository, StoreInvoiceRepository};
use crate::domains::invoice::service::{InvoiceService, InvoiceServiceImpl};
use crate::domains::milestone::repository::{MilestoneRepository, StoreMilestoneRepository};
use crate::domains::milestone::service::{MilestoneService, MilestoneServiceImpl};
use crate::domains::organization::repository::{
    OrganizationRepository, StoreOrganizationRepository,
};
use crate::domains::project::repository::{ProjectRepository, StoreProjectRepository};
use crate::domains::project::service::{ProjectService, ProjectServiceImpl};
use crate::domains::report::repository::{MonthlyReportRepository, StoreMonthlyReportRepository};
use crate::domains::report::service::{MonthlyReportService, MonthlyReportServiceImpl};
use crate::domains::service_request::repository::{
    ServiceRequestRepository, StoreServiceRequestRepository,
};
use crate::domains::time_entry::repository::{StoreTimeEntryRepository, TimeEntryRepository};
use crate::domains::time_entry::service::{TimeEntryService, TimeEntryServiceImpl};
use crate::store::{MemoryObjectStore, ObjectStore, TimeoutStore};

/// The wired service graph.
///
/// Construction order matters: repositories write through the dispatcher,
/// and the dispatcher's listeners (reference assignment, cache
/// invalidation) are registered before any repository is handed out, so no
/// write can slip past the hooks.
pub struct CoreServices {
    pub config: EngineConfig,
    pub cache: Arc<dyn Cache>,
    pub dispatcher: Arc<ChangeDispatcher>,

    pub organization_repo: Arc<dyn OrganizationRepository>,
    pub service_request_repo: Arc<dyn ServiceRequestRepository>,
    pub project_repo: Arc<dyn ProjectRepository>,
    pub milestone_repo: Arc<dyn MilestoneRepository>,
    pub invoice_repo: Arc<dyn InvoiceRepository>,
    pub time_entry_repo: Arc<dyn TimeEntryRepository>,
    pub report_repo: Arc<dyn MonthlyReportRepository>,

    pub references: Arc<ReferenceService>,
    pub projects: Arc<dyn ProjectService>,
    pub milestones: Arc<dyn MilestoneService>,
    pub invoices: Arc<dyn InvoiceService>,
    pub time_entries: Arc<dyn TimeEntryService>,
    pub reports: Arc<dyn MonthlyReportService>,
}

impl CoreServices {
    pub fn new(store: Arc<dyn ObjectStore>, cache: Arc<dyn Cache>, config: EngineConfig) -> Self {
        // Every store call gets a bounded deadline.
        let store: Arc<dyn ObjectStore> =
            Arc::new(TimeoutStore::new(store, config.store_timeout));
        let dispatcher = Arc::new(ChangeDispatcher::new());

        let organization_repo = Arc::new(StoreOrganizationRepository::new(
            store.clone(),
            dispatcher.clone(),
        ));
        let service_request_repo = Arc::new(StoreServiceRequestRepository::new(
            store.clone(),
            dispatcher.clone(),
        ));
        let project_repo = Arc::new(StoreProjectRepository::new(store.clone(), dispatcher.clone()));
        let milestone_repo = Arc::new(StoreMilestoneRepository::new(
            store.clone(),
            dispatcher.clone(),
        ));
        let invoice_repo = Arc::new(StoreInvoiceRepository::new(store.clone(), dispatcher.clone()));
        let time_entry_repo = Arc::new(StoreTimeEntryRepository::new(
            store.clone(),
            dispatcher.clone(),
        ));
        let report_repo = Arc::new(StoreMonthlyReportRepository::new(store, dispatcher.clone()));

        let references = Arc::new(ReferenceService::new(
            project_repo.clone(),
            milestone_repo.clone(),
            invoice_repo.clone(),
        ));
        dispatcher.register(references.clone());
        dispatcher.register(Arc::new(InvalidationRouter::new(cache.clone())));

        let projects = Arc::new(ProjectServiceImpl::new(
            project_repo.clone(),
            organization_repo.clone(),
            milestone_repo.clone(),
            cache.clone(),
            &config,
        ));
        let milestones = Arc::new(MilestoneServiceImpl::new(
            milestone_repo.clone(),
            project_repo.clone(),
            invoice_repo.clone(),
        ));
        let invoices = Arc::new(InvoiceServiceImpl::new(
            invoice_repo.clone(),
            milestone_repo.clone(),
            cache.clone(),
            &config,
        ));
        let time_entries = Arc::new(TimeEntryServiceImpl::new(
            time_entry_repo.clone(),
            cache.clone(),
            &config,
        ));
        let reports = Arc::new(MonthlyReportServiceImpl::new(
            report_repo.clone(),
            organization_repo.clone(),
            service_request_repo.clone(),
            time_entry_repo.clone(),
            cache.clone(),
            &config,
        ));

        Self {
            config,
            cache,
            dispatcher,
            organization_repo,
            service_request_repo,
            project_repo,
            milestone_repo,
            invoice_repo,
            time_entry_repo,
            report_repo,
            references,
            projects,
            milestones,
            invoices,
            time_entries,
            reports,
        }
    }

    /// In-process stack: memory store, memory cache, default config.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryCache::new()),
            EngineConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::invoice::types::{InvoiceStatus, NewInvoice, PaymentMeta};
    use crate::domains::milestone::types::{NewMilestone, PaymentStatus, WorkStatus};
    use crate::domains::organization::types::NewOrganization;
    use crate::domains::project::types::{NewProject, ProjectStatus};
    use crate::domains::report::types::NewMonthlyReport;
    use crate::domains::service_request::types::{NewServiceRequest, RequestStatus};
    use crate::domains::time_entry::types::{NewTimeEntry, TimeEntryScope};
    use crate::types::EntityId;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    async fn organization(core: &CoreServices, shortcode: &str) -> EntityId {
        core.organization_repo
            .create(&NewOrganization {
                shortcode: shortcode.to_string(),
                name: format!("{} GmbH", shortcode),
                free_hours_limit: None,
            })
            .await
            .unwrap()
            .id
    }

    fn new_project(organization_id: EntityId, name: &str) -> NewProject {
        NewProject {
            organization_id,
            name: name.to_string(),
            status: ProjectStatus::Active,
            total_budget: dec!(0),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_billing_scenario() {
        init_logging();
        let core = CoreServices::in_memory();
        let org = organization(&core, "ACME").await;

        // Six earlier projects take PR-0001 through PR-0006.
        for n in 1..=6 {
            core.projects
                .create_project(new_project(org, &format!("Earlier {}", n)))
                .await
                .unwrap();
        }

        let project = core
            .projects
            .create_project(new_project(org, "Relaunch"))
            .await
            .unwrap();
        let project = core.projects.get_project(project.id).await.unwrap();
        assert_eq!(project.reference_number.as_deref(), Some("PR-0007"));

        let milestone = core
            .milestones
            .create_milestone(NewMilestone {
                project_id: project.id,
                name: "Build".to_string(),
                order: dec!(2),
                amount: dec!(1000),
                work_status: WorkStatus::InProgress,
                is_deposit: false,
            })
            .await
            .unwrap();
        let milestone = core.milestones.get_milestone(milestone.id).await.unwrap();
        assert_eq!(milestone.reference_number.as_deref(), Some("PR-0007-02"));

        // No invoices yet: nothing billed.
        assert_eq!(
            core.milestones.payment_status(milestone.id).await.unwrap(),
            PaymentStatus::Pending
        );

        let invoice = core
            .invoices
            .create_invoice(NewInvoice {
                organization_id: org,
                project_id: None,
                milestone_id: Some(milestone.id),
                amount: dec!(1000),
                status: InvoiceStatus::Pending,
                due_date: None,
                issue_date: None,
            })
            .await
            .unwrap();
        let invoice = core.invoices.get_invoice(invoice.id).await.unwrap();
        assert!(invoice.has_invoice_number());

        assert_eq!(
            core.milestones.payment_status(milestone.id).await.unwrap(),
            PaymentStatus::Invoiced
        );

        core.invoices
            .record_payment(invoice.id, dec!(1000), PaymentMeta::default())
            .await
            .unwrap();

        assert_eq!(
            core.invoices.stored_status(invoice.id).await.unwrap(),
            InvoiceStatus::Paid
        );
        assert_eq!(
            core.milestones.payment_status(milestone.id).await.unwrap(),
            PaymentStatus::Paid
        );
        assert_eq!(core.invoices.balance(invoice.id).await.unwrap(), dec!(0));
    }

    #[tokio::test]
    async fn test_time_entry_write_invalidates_report_summary() {
        init_logging();
        let core = CoreServices::in_memory();
        let org = organization(&core, "ACME").await;

        let request = core
            .service_request_repo
            .create(&NewServiceRequest {
                organization_id: org,
                title: "Mail server down".to_string(),
                status: RequestStatus::Open,
            })
            .await
            .unwrap();

        let report = core
            .reports
            .create_report(NewMonthlyReport {
                organization_id: org,
                report_month: "November 2025".to_string(),
                free_hours_limit: Some(dec!(2.0)),
            })
            .await
            .unwrap();

        let log = |hours, day| {
            let time_entries = core.time_entries.clone();
            let request_id = request.id;
            async move {
                time_entries
                    .log_time(NewTimeEntry {
                        hours,
                        entry_date: NaiveDate::from_ymd_opt(2025, 11, day).unwrap(),
                        billable: true,
                        description: None,
                        scope: TimeEntryScope::ServiceRequest(request_id),
                    })
                    .await
                    .unwrap()
            }
        };

        log(dec!(3.8), 3).await;
        // 3.8h rounds up to 4.0 billable hours.
        assert_eq!(
            core.reports.total_billable_hours(report.id).await.unwrap(),
            dec!(4.0)
        );

        // A new entry must evict the cached summary, not serve stale hours.
        log(dec!(0.1), 12).await;
        assert_eq!(
            core.reports.total_billable_hours(report.id).await.unwrap(),
            dec!(4.25)
        );

        let progress = core.reports.free_hours_progress(report.id).await.unwrap();
        assert_eq!(progress.used, dec!(4.25));
        assert_eq!(progress.limit, dec!(2.0));
        assert_eq!(progress.remaining, dec!(0));

        assert_eq!(core.reports.overage_hours(report.id).await.unwrap(), dec!(2.25));
        assert_eq!(
            core.reports
                .overage_amount(report.id, Some(dec!(30)))
                .await
                .unwrap(),
            dec!(67.50)
        );
    }

    #[tokio::test]
    async fn test_invoice_write_invalidates_pending_list() {
        init_logging();
        let core = CoreServices::in_memory();
        let org = organization(&core, "ACME").await;

        let invoice = core
            .invoices
            .create_invoice(NewInvoice {
                organization_id: org,
                project_id: None,
                milestone_id: None,
                amount: dec!(500),
                status: InvoiceStatus::Pending,
                due_date: None,
                issue_date: None,
            })
            .await
            .unwrap();

        assert_eq!(core.invoices.pending_invoices(org).await.unwrap().len(), 1);

        core.invoices
            .record_payment(invoice.id, dec!(500), PaymentMeta::default())
            .await
            .unwrap();

        // The payment write evicted the cached pending list.
        assert!(core.invoices.pending_invoices(org).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reassigning_service_request_moves_report_hours() {
        init_logging();
        let core = CoreServices::in_memory();
        let first = organization(&core, "ACME").await;
        let second = organization(&core, "GLOBEX").await;

        let request = core
            .service_request_repo
            .create(&NewServiceRequest {
                organization_id: first,
                title: "Quarterly maintenance".to_string(),
                status: RequestStatus::Open,
            })
            .await
            .unwrap();
        core.time_entries
            .log_time(NewTimeEntry {
                hours: dec!(1.0),
                entry_date: NaiveDate::from_ymd_opt(2025, 11, 5).unwrap(),
                billable: true,
                description: None,
                scope: TimeEntryScope::ServiceRequest(request.id),
            })
            .await
            .unwrap();

        let report = core
            .reports
            .create_report(NewMonthlyReport {
                organization_id: first,
                report_month: "November 2025".to_string(),
                free_hours_limit: None,
            })
            .await
            .unwrap();
        assert_eq!(
            core.reports.total_billable_hours(report.id).await.unwrap(),
            dec!(1.0)
        );

        // The association is organization + month with no stored foreign
        // key: moving the request retroactively drains the old report.
        // Service-request writes carry no cache edge, so the summary is
        // flushed by hand to observe the recomputation.
        core.service_request_repo
            .set_organization(request.id, second)
            .await
            .unwrap();
        core.cache
            .flush_pattern(crate::cache::CacheNamespace::ReportSummary.prefix())
            .await;
        assert_eq!(
            core.reports.total_billable_hours(report.id).await.unwrap(),
            dec!(0)
        );
    }
}
