pub mod context;

pub use context::{COMPANY_ID_HEADER, USER_ID_HEADER, USER_NAME_HEADER};
