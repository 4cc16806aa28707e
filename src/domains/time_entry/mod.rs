pub mod repository;
pub mod service;
pub mod types;

pub use repository::{StoreTimeEntryRepository, TimeEntryRepository};
pub use service::{TimeEntryService, TimeEntryServiceImpl};
pub use types::{NewTimeEntry, TimeEntry, TimeEntryScope};
