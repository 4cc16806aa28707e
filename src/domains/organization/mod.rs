pub mod repository;
pub mod types;

pub use repository::{OrganizationRepository, StoreOrganizationRepository};
pub use types::{NewOrganization, Organization, UpdateOrganization};
