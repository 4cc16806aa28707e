use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::cache::{keys, remember, Cache};
use crate::config::EngineConfig;
use crate::domains::core::repository::{HardDeletable, SoftDeletable};
use crate::domains::organization::repository::OrganizationRepository;
use crate::domains::report::repository::MonthlyReportRepository;
use crate::domains::report::types::{
    FreeHoursProgress, MonthlyReport, NewMonthlyReport, ProgressColor, ReportHoursSummary,
};
use crate::domains::service_request::repository::ServiceRequestRepository;
use crate::domains::time_entry::repository::TimeEntryRepository;
use crate::domains::time_entry::types::TimeEntry;
use crate::errors::{DomainResult, ServiceResult};
use crate::types::EntityId;
use crate::validation::Validate;

/// Round hours up to the next quarter-hour billing increment.
///
/// A ceiling, not nearest-rounding: any started increment bills in full.
/// Already-rounded values pass through unchanged.
pub fn round_to_quarter_hour(hours: Decimal) -> Decimal {
    let minutes = hours * dec!(60);
    let increments = (minutes / dec!(15)).ceil();
    increments * dec!(15) / dec!(60)
}

/// Parse a report month like `"November 2025"` into its first and last
/// calendar day.
pub fn parse_report_month(report_month: &str) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::parse_from_str(&format!("1 {}", report_month.trim()), "%d %B %Y").ok()?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

/// Free-hours usage derived from used hours and the resolved limit.
pub fn progress_from(used: Decimal, limit: Decimal) -> FreeHoursProgress {
    let percent_raw = if limit > Decimal::ZERO {
        (used / limit * dec!(100)).round_dp(1)
    } else if used > Decimal::ZERO {
        dec!(100)
    } else {
        Decimal::ZERO
    };

    FreeHoursProgress {
        used,
        limit,
        percent: percent_raw.min(dec!(100)),
        percent_raw,
        remaining: (limit - used).max(Decimal::ZERO),
    }
}

/// Color banding over the uncapped percentage.
pub fn color_for(percent_raw: Decimal) -> ProgressColor {
    if percent_raw < dec!(51) {
        ProgressColor::Blue
    } else if percent_raw < dec!(81) {
        ProgressColor::Yellow
    } else if percent_raw < dec!(100) {
        ProgressColor::Orange
    } else {
        ProgressColor::Red
    }
}

/// Trait defining monthly report service operations
#[async_trait]
pub trait MonthlyReportService: Send + Sync {
    async fn create_report(&self, new_report: NewMonthlyReport) -> ServiceResult<MonthlyReport>;

    async fn get_report(&self, id: EntityId) -> ServiceResult<MonthlyReport>;

    async fn reports_for_organization(
        &self,
        organization_id: EntityId,
    ) -> ServiceResult<Vec<MonthlyReport>>;

    async fn delete_report(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()>;

    /// `[first, last]` calendar-day bounds of the report month, or `None`
    /// when the month cannot be parsed (every total degrades to zero).
    async fn resolve_report_window(
        &self,
        id: EntityId,
    ) -> ServiceResult<Option<(NaiveDate, NaiveDate)>>;

    /// The organization's service-request time entries inside the report
    /// window, date-ascending.
    async fn time_entries_for_report(&self, id: EntityId) -> ServiceResult<Vec<TimeEntry>>;

    /// Quarter-rounded billable hours in the report month.
    async fn total_billable_hours(&self, id: EntityId) -> ServiceResult<Decimal>;

    /// Quarter-rounded hours including non-billable entries.
    async fn total_all_hours(&self, id: EntityId) -> ServiceResult<Decimal>;

    /// Report override, else organization override, else configured default.
    async fn free_hours_limit(&self, id: EntityId) -> ServiceResult<Decimal>;

    async fn free_hours_progress(&self, id: EntityId) -> ServiceResult<FreeHoursProgress>;

    async fn progress_color(&self, id: EntityId) -> ServiceResult<ProgressColor>;

    /// Billable hours beyond the allowance, rounded to two decimals.
    async fn overage_hours(&self, id: EntityId) -> ServiceResult<Decimal>;

    /// Overage charge at `rate` (configured hourly rate when omitted).
    async fn overage_amount(&self, id: EntityId, rate: Option<Decimal>) -> ServiceResult<Decimal>;
}

/// Monthly report service implementation
pub struct MonthlyReportServiceImpl {
    repo: Arc<dyn MonthlyReportRepository>,
    organization_repo: Arc<dyn OrganizationRepository>,
    service_request_repo: Arc<dyn ServiceRequestRepository>,
    time_entry_repo: Arc<dyn TimeEntryRepository>,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
    default_free_hours: Decimal,
    default_hourly_rate: Decimal,
}

impl MonthlyReportServiceImpl {
    pub fn new(
        repo: Arc<dyn MonthlyReportRepository>,
        organization_repo: Arc<dyn OrganizationRepository>,
        service_request_repo: Arc<dyn ServiceRequestRepository>,
        time_entry_repo: Arc<dyn TimeEntryRepository>,
        cache: Arc<dyn Cache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            repo,
            organization_repo,
            service_request_repo,
            time_entry_repo,
            cache,
            cache_ttl: config.cache_ttl,
            default_free_hours: config.default_free_hours,
            default_hourly_rate: config.default_hourly_rate,
        }
    }

    async fn entries_for(&self, report: &MonthlyReport) -> DomainResult<Vec<TimeEntry>> {
        let window = match parse_report_month(&report.report_month) {
            Some(window) => window,
            None => {
                log::warn!(
                    "Report {} has unparsable month '{}', treating as empty",
                    report.id,
                    report.report_month
                );
                return Ok(Vec::new());
            }
        };

        let request_ids = self
            .service_request_repo
            .ids_for_organization(report.organization_id)
            .await?;
        self.time_entry_repo
            .find_for_service_requests_in_window(&request_ids, window.0, window.1)
            .await
    }

    /// Cached billable/total hour sums for one report.
    async fn hours_summary(&self, id: EntityId) -> ServiceResult<ReportHoursSummary> {
        let report = self.repo.find_by_id(id).await?;
        let key = keys::report_summary(id);
        let summary = remember(self.cache.as_ref(), &key, self.cache_ttl, || async {
            let entries = self.entries_for(&report).await?;

            let billable_hours = entries
                .iter()
                .filter(|e| e.billable)
                .map(|e| round_to_quarter_hour(e.hours))
                .sum();
            let total_hours = entries
                .iter()
                .map(|e| round_to_quarter_hour(e.hours))
                .sum();
            Ok(ReportHoursSummary {
                billable_hours,
                total_hours,
            })
        })
        .await?;
        Ok(summary)
    }
}

#[async_trait]
impl MonthlyReportService for MonthlyReportServiceImpl {
    async fn create_report(&self, new_report: NewMonthlyReport) -> ServiceResult<MonthlyReport> {
        new_report.validate()?;
        // The organization must be live.
        self.organization_repo
            .find_by_id(new_report.organization_id)
            .await?;
        Ok(self.repo.create(&new_report).await?)
    }

    async fn get_report(&self, id: EntityId) -> ServiceResult<MonthlyReport> {
        Ok(self.repo.find_by_id(id).await?)
    }

    async fn reports_for_organization(
        &self,
        organization_id: EntityId,
    ) -> ServiceResult<Vec<MonthlyReport>> {
        Ok(self.repo.find_by_organization(organization_id).await?)
    }

    async fn delete_report(&self, id: EntityId, hard_delete: bool) -> ServiceResult<()> {
        if hard_delete {
            self.repo.hard_delete(id).await?;
        } else {
            self.repo.soft_delete(id).await?;
        }
        Ok(())
    }

    async fn resolve_report_window(
        &self,
        id: EntityId,
    ) -> ServiceResult<Option<(NaiveDate, NaiveDate)>> {
        let report = self.repo.find_by_id(id).await?;
        Ok(parse_report_month(&report.report_month))
    }

    async fn time_entries_for_report(&self, id: EntityId) -> ServiceResult<Vec<TimeEntry>> {
        let report = self.repo.find_by_id(id).await?;
        Ok(self.entries_for(&report).await?)
    }

    async fn total_billable_hours(&self, id: EntityId) -> ServiceResult<Decimal> {
        Ok(self.hours_summary(id).await?.billable_hours)
    }

    async fn total_all_hours(&self, id: EntityId) -> ServiceResult<Decimal> {
        Ok(self.hours_summary(id).await?.total_hours)
    }

    async fn free_hours_limit(&self, id: EntityId) -> ServiceResult<Decimal> {
        let report = self.repo.find_by_id(id).await?;
        if let Some(limit) = report.free_hours_limit {
            return Ok(limit);
        }
        let organization = self
            .organization_repo
            .find_by_id(report.organization_id)
            .await?;
        Ok(organization
            .free_hours_limit
            .unwrap_or(self.default_free_hours))
    }

    async fn free_hours_progress(&self, id: EntityId) -> ServiceResult<FreeHoursProgress> {
        let used = self.total_billable_hours(id).await?;
        let limit = self.free_hours_limit(id).await?;
        Ok(progress_from(used, limit))
    }

    async fn progress_color(&self, id: EntityId) -> ServiceResult<ProgressColor> {
        let progress = self.free_hours_progress(id).await?;
        Ok(color_for(progress.percent_raw))
    }

    async fn overage_hours(&self, id: EntityId) -> ServiceResult<Decimal> {
        let used = self.total_billable_hours(id).await?;
        let limit = self.free_hours_limit(id).await?;
        Ok((used - limit).max(Decimal::ZERO).round_dp(2))
    }

    async fn overage_amount(&self, id: EntityId, rate: Option<Decimal>) -> ServiceResult<Decimal> {
        let rate = rate.unwrap_or(self.default_hourly_rate);
        let overage = self.overage_hours(id).await?;
        Ok((overage * rate).round_dp(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_hour_rounding() {
        assert_eq!(round_to_quarter_hour(dec!(0.1)), dec!(0.25));
        assert_eq!(round_to_quarter_hour(dec!(1.0)), dec!(1.0));
        assert_eq!(round_to_quarter_hour(dec!(1.26)), dec!(1.5));
        assert_eq!(round_to_quarter_hour(dec!(0)), dec!(0));

        // Idempotent on already-rounded values.
        for raw in [dec!(0.1), dec!(1.26), dec!(3.8), dec!(0.75)] {
            let rounded = round_to_quarter_hour(raw);
            assert_eq!(round_to_quarter_hour(rounded), rounded);
        }
    }

    #[test]
    fn test_parse_report_month() {
        let (first, last) = parse_report_month("November 2025").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2025, 11, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 11, 30).unwrap());

        let (first, last) = parse_report_month("February 2024").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        assert!(parse_report_month("Brumaire 2025").is_none());
        assert!(parse_report_month("").is_none());
    }

    #[test]
    fn test_progress_math() {
        let progress = progress_from(dec!(5.25), dec!(2.0));
        assert_eq!(progress.percent_raw, dec!(262.5));
        assert_eq!(progress.percent, dec!(100));
        assert_eq!(progress.remaining, Decimal::ZERO);

        let progress = progress_from(dec!(1.0), dec!(2.0));
        assert_eq!(progress.percent_raw, dec!(50.0));
        assert_eq!(progress.remaining, dec!(1.0));

        // A zero allowance with hours on the books reads as fully spent.
        assert_eq!(progress_from(dec!(1), Decimal::ZERO).percent_raw, dec!(100));
        assert_eq!(progress_from(Decimal::ZERO, Decimal::ZERO).percent_raw, Decimal::ZERO);
    }

    #[test]
    fn test_color_bands() {
        assert_eq!(color_for(dec!(0)), ProgressColor::Blue);
        assert_eq!(color_for(dec!(50.9)), ProgressColor::Blue);
        assert_eq!(color_for(dec!(51)), ProgressColor::Yellow);
        assert_eq!(color_for(dec!(80)), ProgressColor::Yellow);
        assert_eq!(color_for(dec!(81)), ProgressColor::Orange);
        assert_eq!(color_for(dec!(99)), ProgressColor::Orange);
        assert_eq!(color_for(dec!(100)), ProgressColor::Red);
        assert_eq!(color_for(dec!(262.5)), ProgressColor::Red);
    }

    #[test]
    fn test_overage_example() {
        // freeHoursLimit = 2.0, used = 5.25 -> 3.25 overage, 97.50 at rate 30.
        let overage = (dec!(5.25) - dec!(2.0)).max(Decimal::ZERO).round_dp(2);
        assert_eq!(overage, dec!(3.25));
        assert_eq!((overage * dec!(30)).round_dp(2), dec!(97.50));
    }
}
