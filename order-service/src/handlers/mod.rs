//! HTTP handlers for order-service.

pub mod invoices;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod stages;
pub mod sub_tasks;

pub use invoices::*;
pub use orders::*;
pub use payments::*;
pub use stages::*;
pub use sub_tasks::*;
