use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::Cache;
use crate::domains::core::hooks::ChangeListener;
use crate::store::EntityType;
use crate::types::{ChangeEvent, ChangeOrigin};

/// Logical cache namespaces. Every cached value lives under exactly one of
/// these prefixes (see [`crate::cache::keys`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheNamespace {
    ServiceRequestHours,
    ProjectHours,
    MilestoneHours,
    ReportSummary,
    InvoiceList,
    PendingInvoices,
    ProjectRollup,
    ProjectList,
}

impl CacheNamespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::ServiceRequestHours => "service_request_hours_",
            CacheNamespace::ProjectHours => "project_hours_",
            CacheNamespace::MilestoneHours => "milestone_hours_",
            CacheNamespace::ReportSummary => "report_summary_",
            CacheNamespace::InvoiceList => "invoice_list_",
            CacheNamespace::PendingInvoices => "pending_invoices_",
            CacheNamespace::ProjectRollup => "project_rollup_",
            CacheNamespace::ProjectList => "project_list_",
        }
    }
}

/// Which namespaces each entity type's derived values feed.
///
/// A time entry rolls up into service-request hour counts, project and
/// milestone hour rollups, and monthly report totals; invoices feed the
/// org-scoped invoice lists; milestones feed project budget/progress;
/// projects feed the project lists. Types with an empty entry hold no
/// cached derivations of their own.
const DEPENDENCIES: &[(EntityType, &[CacheNamespace])] = &[
    (EntityType::Organization, &[]),
    (
        EntityType::TimeEntry,
        &[
            CacheNamespace::ServiceRequestHours,
            CacheNamespace::ProjectHours,
            CacheNamespace::MilestoneHours,
            CacheNamespace::ReportSummary,
        ],
    ),
    (
        EntityType::Invoice,
        &[CacheNamespace::InvoiceList, CacheNamespace::PendingInvoices],
    ),
    (
        EntityType::InvoiceLineItem,
        &[CacheNamespace::InvoiceList, CacheNamespace::PendingInvoices],
    ),
    (EntityType::Milestone, &[CacheNamespace::ProjectRollup]),
    (EntityType::Project, &[CacheNamespace::ProjectList]),
    (EntityType::ServiceRequest, &[]),
    (EntityType::MonthlyReport, &[]),
];

/// Evicts cache entries whose underlying data changed.
///
/// Writes and deletions route identically through the typed dependency
/// table above; autosave/revision writes are filtered at the entry point.
pub struct InvalidationRouter {
    cache: Arc<dyn Cache>,
}

impl InvalidationRouter {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::validate_table();
        Self { cache }
    }

    /// The table must name every tracked entity type exactly once,
    /// otherwise a write could silently stop invalidating what a read
    /// depends on.
    fn validate_table() {
        for entity_type in EntityType::ALL {
            let entries = DEPENDENCIES
                .iter()
                .filter(|(t, _)| *t == entity_type)
                .count();
            assert_eq!(
                entries, 1,
                "cache dependency table must have exactly one entry for {}",
                entity_type
            );
        }
    }

    pub fn namespaces_for(entity_type: EntityType) -> &'static [CacheNamespace] {
        DEPENDENCIES
            .iter()
            .find(|(t, _)| *t == entity_type)
            .map(|(_, namespaces)| *namespaces)
            .unwrap_or(&[])
    }

    /// Route one mutation; returns how many cache entries were evicted.
    pub async fn route(&self, event: &ChangeEvent) -> usize {
        if event.origin == ChangeOrigin::Revision {
            return 0;
        }

        let mut evicted = 0;
        for namespace in Self::namespaces_for(event.entity_type) {
            evicted += self.cache.flush_pattern(namespace.prefix()).await;
        }
        if evicted > 0 {
            log::debug!(
                "Evicted {} cache entries after {:?} of {} {}",
                evicted,
                event.kind,
                event.entity_type,
                event.id
            );
        }
        evicted
    }
}

#[async_trait]
impl ChangeListener for InvalidationRouter {
    async fn on_change(&self, event: &ChangeEvent) {
        self.route(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::types::ChangeEvent;
    use serde_json::json;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    async fn seeded_cache() -> Arc<MemoryCache> {
        let cache = Arc::new(MemoryCache::new());
        cache.set("service_request_hours_4", json!(6.5), TTL).await;
        cache.set("project_hours_2", json!(12.0), TTL).await;
        cache.set("milestone_hours_9", json!(3.0), TTL).await;
        cache.set("report_summary_1", json!({"billable": 8.0}), TTL).await;
        cache.set("pending_invoices_3", json!([10, 11]), TTL).await;
        cache.set("invoice_list_3", json!([10, 11, 12]), TTL).await;
        cache.set("project_rollup_2", json!({"invoiced": "1000"}), TTL).await;
        cache.set("project_list_active_5", json!([2]), TTL).await;
        cache
    }

    #[tokio::test]
    async fn test_time_entry_write_evicts_hour_rollups() {
        let cache = seeded_cache().await;
        let router = InvalidationRouter::new(cache.clone());

        let evicted = router.route(&ChangeEvent::updated(EntityType::TimeEntry, 77)).await;
        assert_eq!(evicted, 4);

        assert!(cache.get("service_request_hours_4").await.is_none());
        assert!(cache.get("project_hours_2").await.is_none());
        assert!(cache.get("milestone_hours_9").await.is_none());
        assert!(cache.get("report_summary_1").await.is_none());
        // Invoice-derived entries are untouched by a time entry write.
        assert!(cache.get("pending_invoices_3").await.is_some());
    }

    #[tokio::test]
    async fn test_invoice_write_evicts_invoice_lists_only() {
        let cache = seeded_cache().await;
        let router = InvalidationRouter::new(cache.clone());

        router.route(&ChangeEvent::updated(EntityType::Invoice, 10)).await;

        assert!(cache.get("pending_invoices_3").await.is_none());
        assert!(cache.get("invoice_list_3").await.is_none());
        assert!(cache.get("report_summary_1").await.is_some());
        assert!(cache.get("project_rollup_2").await.is_some());
    }

    #[tokio::test]
    async fn test_deletion_routes_like_a_write() {
        let cache = seeded_cache().await;
        let router = InvalidationRouter::new(cache.clone());

        router.route(&ChangeEvent::deleted(EntityType::Milestone, 9)).await;
        assert!(cache.get("project_rollup_2").await.is_none());
    }

    #[tokio::test]
    async fn test_revision_writes_are_filtered() {
        let cache = seeded_cache().await;
        let router = InvalidationRouter::new(cache.clone());

        let event = ChangeEvent::updated(EntityType::TimeEntry, 77)
            .with_origin(ChangeOrigin::Revision);
        assert_eq!(router.route(&event).await, 0);
        assert!(cache.get("report_summary_1").await.is_some());
    }

    #[test]
    fn test_table_covers_every_entity_type() {
        for entity_type in EntityType::ALL {
            // Will panic inside validate_table if an entry is missing.
            let _ = InvalidationRouter::namespaces_for(entity_type);
        }
        InvalidationRouter::validate_table();
    }
}
