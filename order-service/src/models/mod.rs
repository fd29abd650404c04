pub mod activity;
pub mod actor;
pub mod append_log;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod sale_record;
pub mod stage;
pub mod staff;
pub mod sub_task;
pub mod work_item;

pub use activity::{ActivityLog, ActivityType};
pub use actor::Actor;
pub use append_log::AppendLog;
pub use invoice::{Invoice, InvoiceItem, TaxType};
pub use order::{
    Assignment, CustomerSnapshot, Financials, LineItem, NoteEntry, NoteKind, Order, OrderStatus,
    OrderType, PaymentStatus, Priority, ProductItem, ServiceItem, StageHistoryEntry,
    SubTaskRollup,
};
pub use payment::{Payment, PaymentMethod, PaymentRecordStatus};
pub use sale_record::{Quarter, SaleRecord, SaleType};
pub use stage::Stage;
pub use staff::{Staff, StaffRole, StaffStatus};
pub use sub_task::{PartUsed, SubTask, SubTaskStatus, SubTaskUpdate, UpdateType};
pub use work_item::{OrderRef, SubTaskRef, WorkItem};

/// A string did not name any variant of a closed enumeration.
#[derive(Debug, thiserror::Error)]
#[error("Invalid {field} '{value}'; expected one of: {expected}")]
pub struct InvalidVariant {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl InvalidVariant {
    pub fn new(field: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            field,
            value: value.to_string(),
            expected,
        }
    }
}
