//! Deterministic cache key builders.
//!
//! Every cached aggregate lives under exactly one [`CacheNamespace`] prefix,
//! so the invalidation router can evict by prefix without knowing which ids
//! are populated.

use crate::cache::CacheNamespace;
use crate::types::EntityId;

pub fn service_request_hours(id: EntityId) -> String {
    format!("{}{}", CacheNamespace::ServiceRequestHours.prefix(), id)
}

pub fn project_hours(id: EntityId) -> String {
    format!("{}{}", CacheNamespace::ProjectHours.prefix(), id)
}

pub fn milestone_hours(id: EntityId) -> String {
    format!("{}{}", CacheNamespace::MilestoneHours.prefix(), id)
}

pub fn report_summary(id: EntityId) -> String {
    format!("{}{}", CacheNamespace::ReportSummary.prefix(), id)
}

pub fn invoice_list(organization_id: EntityId) -> String {
    format!("{}{}", CacheNamespace::InvoiceList.prefix(), organization_id)
}

pub fn pending_invoices(organization_id: EntityId) -> String {
    format!("{}{}", CacheNamespace::PendingInvoices.prefix(), organization_id)
}

pub fn project_rollup(project_id: EntityId) -> String {
    format!("{}{}", CacheNamespace::ProjectRollup.prefix(), project_id)
}

pub fn active_projects(limit: u32) -> String {
    format!("{}active_{}", CacheNamespace::ProjectList.prefix(), limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_live_under_their_namespace() {
        assert!(project_hours(7).starts_with(CacheNamespace::ProjectHours.prefix()));
        assert!(pending_invoices(3).starts_with(CacheNamespace::PendingInvoices.prefix()));
        assert!(active_projects(10).starts_with(CacheNamespace::ProjectList.prefix()));
        assert_eq!(project_hours(7), "project_hours_7");
    }
}
