//! Staff directory lookups used to validate assignment targets.

use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;

use crate::models::Staff;
use crate::services::store::Store;

#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// Staff member of `company_id` who may receive work.
    ///
    /// `NotFound` when the id is unknown or belongs to another company,
    /// `PreconditionFailed` when the member is not active.
    async fn find_active_by_id(&self, company_id: &str, id: &str) -> Result<Staff, AppError>;
}

/// Directory backed by the `staff` collection.
#[derive(Clone)]
pub struct StoreDirectory {
    store: Arc<dyn Store>,
}

impl StoreDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StaffDirectory for StoreDirectory {
    async fn find_active_by_id(&self, company_id: &str, id: &str) -> Result<Staff, AppError> {
        let staff = self
            .store
            .get_staff(id)
            .await?
            .filter(|s| s.company_id == company_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Staff member {} not found", id)))?;

        if !staff.is_active() {
            return Err(AppError::PreconditionFailed(anyhow::anyhow!(
                "Cannot assign to inactive staff member {}",
                staff.full_name
            )));
        }

        Ok(staff)
    }
}
