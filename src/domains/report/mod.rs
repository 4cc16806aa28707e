pub mod repository;
pub mod service;
pub mod types;

pub use repository::{MonthlyReportRepository, StoreMonthlyReportRepository};
pub use service::{MonthlyReportService, MonthlyReportServiceImpl};
pub use types::{
    FreeHoursProgress, MonthlyReport, NewMonthlyReport, ProgressColor, ReportHoursSummary,
};
