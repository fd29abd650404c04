pub mod activity;
pub mod directory;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod numbering;
pub mod stages;
pub mod store;
pub mod totals;

pub use activity::{ActivitySink, ChannelActivitySink};
pub use directory::{StaffDirectory, StoreDirectory};
pub use ledger::{InvoiceRequest, Ledger, PaymentRequest};
pub use lifecycle::LifecycleEngine;
pub use stages::StageRegistry;
pub use store::{MemoryStore, MongoStore, Store};
