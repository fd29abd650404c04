//! Durable document store seam.
//!
//! Every write to an order, sub-task, invoice or payment is conditioned on the version
//! the caller read: the caller bumps `version` on the document and passes the version it
//! expects to find stored. A mismatch yields [`AppError::Conflict`].

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;

use crate::models::{
    ActivityLog, Invoice, Order, Payment, SaleRecord, Stage, Staff, SubTask,
};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip to the backing database.
    async fn ping(&self) -> Result<(), AppError>;

    /// All stages, active or not, ordered by `sequence_order`.
    async fn list_stages(&self) -> Result<Vec<Stage>, AppError>;
    async fn insert_stages(&self, stages: &[Stage]) -> Result<(), AppError>;

    async fn get_staff(&self, id: &str) -> Result<Option<Staff>, AppError>;
    async fn upsert_staff(&self, staff: &Staff) -> Result<(), AppError>;

    /// Atomically increment and return the named counter, starting at 1.
    async fn next_sequence(&self, key: &str) -> Result<i64, AppError>;

    async fn insert_order(&self, order: &Order) -> Result<(), AppError>;
    async fn get_order(&self, id: &str) -> Result<Option<Order>, AppError>;
    async fn replace_order_if_version(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<(), AppError>;
    /// Non-deleted orders whose assignment names `engineer_id`.
    async fn list_orders_assigned_to(
        &self,
        company_id: &str,
        engineer_id: &str,
    ) -> Result<Vec<Order>, AppError>;

    async fn insert_sub_task(&self, task: &SubTask) -> Result<(), AppError>;
    async fn get_sub_task(&self, id: &str) -> Result<Option<SubTask>, AppError>;
    async fn replace_sub_task_if_version(
        &self,
        task: &SubTask,
        expected_version: i64,
    ) -> Result<(), AppError>;
    /// Non-deleted sub-tasks of an order, oldest first.
    async fn list_sub_tasks(&self, order_id: &str) -> Result<Vec<SubTask>, AppError>;
    async fn list_sub_tasks_assigned_to(
        &self,
        company_id: &str,
        staff_id: &str,
    ) -> Result<Vec<SubTask>, AppError>;
    async fn soft_delete_sub_tasks_for_order(
        &self,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Fails with `Conflict` when the order already has an active invoice.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, AppError>;
    async fn find_invoice_for_order(&self, order_id: &str) -> Result<Option<Invoice>, AppError>;
    async fn replace_invoice_if_version(
        &self,
        invoice: &Invoice,
        expected_version: i64,
    ) -> Result<(), AppError>;
    async fn list_invoices_for_order(&self, order_id: &str) -> Result<Vec<Invoice>, AppError>;

    async fn insert_payment(&self, payment: &Payment) -> Result<(), AppError>;
    async fn get_payment(&self, id: &str) -> Result<Option<Payment>, AppError>;
    async fn replace_payment_if_version(
        &self,
        payment: &Payment,
        expected_version: i64,
    ) -> Result<(), AppError>;
    /// Every payment of an invoice, deleted ones included, oldest first.
    async fn list_payments_for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>, AppError>;
    async fn list_payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, AppError>;

    async fn upsert_sale_record(&self, record: &SaleRecord) -> Result<(), AppError>;
    async fn get_sale_record(&self, invoice_id: &str) -> Result<Option<SaleRecord>, AppError>;

    async fn insert_activity(&self, entry: &ActivityLog) -> Result<(), AppError>;
    /// Non-deleted activity of an order, newest first.
    async fn list_activity(&self, order_id: &str) -> Result<Vec<ActivityLog>, AppError>;
    async fn soft_delete_activity_for_order(&self, order_id: &str) -> Result<u64, AppError>;
}

pub(crate) fn version_conflict(kind: &str, id: &str) -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "{} {} was modified concurrently",
        kind,
        id
    ))
}

fn not_found(kind: &str, id: &str) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} {} not found", kind, id))
}

/// A live order of `company_id`. Deleted orders and other tenants' orders are `NotFound`.
pub(crate) async fn load_order(
    store: &dyn Store,
    company_id: &str,
    id: &str,
) -> Result<Order, AppError> {
    store
        .get_order(id)
        .await?
        .filter(|o| o.company_id == company_id && !o.is_deleted)
        .ok_or_else(|| not_found("Order", id))
}

pub(crate) async fn load_sub_task(
    store: &dyn Store,
    company_id: &str,
    id: &str,
) -> Result<SubTask, AppError> {
    store
        .get_sub_task(id)
        .await?
        .filter(|t| t.company_id == company_id && !t.is_deleted)
        .ok_or_else(|| not_found("Sub-task", id))
}

pub(crate) async fn load_invoice(
    store: &dyn Store,
    company_id: &str,
    id: &str,
) -> Result<Invoice, AppError> {
    store
        .get_invoice(id)
        .await?
        .filter(|i| i.company_id == company_id && !i.is_deleted)
        .ok_or_else(|| not_found("Invoice", id))
}

pub(crate) async fn load_payment(
    store: &dyn Store,
    company_id: &str,
    id: &str,
) -> Result<Payment, AppError> {
    store
        .get_payment(id)
        .await?
        .filter(|p| p.company_id == company_id && !p.is_deleted)
        .ok_or_else(|| not_found("Payment", id))
}
