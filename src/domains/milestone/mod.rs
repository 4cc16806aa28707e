pub mod repository;
pub mod service;
pub mod types;

pub use repository::{MilestoneRepository, StoreMilestoneRepository};
pub use service::{MilestoneService, MilestoneServiceImpl};
pub use types::{Milestone, NewMilestone, PaymentStatus, UpdateMilestone, WorkStatus};
