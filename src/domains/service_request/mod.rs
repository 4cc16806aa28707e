pub mod repository;
pub mod types;

pub use repository::{ServiceRequestRepository, StoreServiceRequestRepository};
pub use types::{NewServiceRequest, RequestStatus, ServiceRequest};
