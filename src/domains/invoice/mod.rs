pub mod repository;
pub mod service;
pub mod types;

pub use repository::{InvoiceRepository, StoreInvoiceRepository};
pub use service::{InvoiceService, InvoiceServiceImpl};
pub use types::{
    Invoice, InvoiceLineItem, InvoiceStatus, LineType, NewInvoice, NewInvoiceLineItem,
    PaymentMeta, UpdateInvoice,
};
