//! In-process store with the same conditional-write semantics as [`super::MongoStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{version_conflict, Store};
use crate::models::{
    ActivityLog, Invoice, Order, Payment, SaleRecord, Stage, Staff, SubTask,
};

#[derive(Default)]
pub struct MemoryStore {
    stages: DashMap<String, Stage>,
    staff: DashMap<String, Staff>,
    counters: DashMap<String, i64>,
    orders: DashMap<String, Order>,
    sub_tasks: DashMap<String, SubTask>,
    invoices: DashMap<String, Invoice>,
    /// order id -> id of its active invoice
    invoice_by_order: DashMap<String, String>,
    payments: DashMap<String, Payment>,
    sale_records: DashMap<String, SaleRecord>,
    activity: DashMap<String, ActivityLog>,
    fail_sale_records: AtomicBool,
    fail_activity: AtomicBool,
    fail_orders: AtomicBool,
    fail_invoices: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every sale-record upsert fail until switched off.
    pub fn fail_sale_record_writes(&self, fail: bool) {
        self.fail_sale_records.store(fail, Ordering::SeqCst);
    }

    /// Make every versioned order write fail until switched off.
    pub fn fail_order_writes(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    /// Make every versioned invoice write fail until switched off.
    pub fn fail_invoice_writes(&self, fail: bool) {
        self.fail_invoices.store(fail, Ordering::SeqCst);
    }

    /// Make every activity insert fail until switched off.
    pub fn fail_activity_writes(&self, fail: bool) {
        self.fail_activity.store(fail, Ordering::SeqCst);
    }
}

fn replace_versioned<T: Clone>(
    map: &DashMap<String, T>,
    kind: &str,
    id: &str,
    value: &T,
    expected_version: i64,
    version_of: impl Fn(&T) -> i64,
) -> Result<(), AppError> {
    match map.get_mut(id) {
        Some(mut slot) => {
            if version_of(&slot) != expected_version {
                return Err(version_conflict(kind, id));
            }
            *slot = value.clone();
            Ok(())
        }
        None => Err(AppError::NotFound(anyhow::anyhow!("{} {} not found", kind, id))),
    }
}

fn insert_new<T: Clone>(
    map: &DashMap<String, T>,
    kind: &str,
    id: &str,
    value: &T,
) -> Result<(), AppError> {
    match map.entry(id.to_string()) {
        Entry::Occupied(_) => Err(AppError::Conflict(anyhow::anyhow!(
            "{} {} already exists",
            kind,
            id
        ))),
        Entry::Vacant(slot) => {
            slot.insert(value.clone());
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn list_stages(&self) -> Result<Vec<Stage>, AppError> {
        let mut stages: Vec<Stage> = self.stages.iter().map(|s| s.value().clone()).collect();
        stages.sort_by_key(|s| s.sequence_order);
        Ok(stages)
    }

    async fn insert_stages(&self, stages: &[Stage]) -> Result<(), AppError> {
        for stage in stages {
            self.stages.insert(stage.id.clone(), stage.clone());
        }
        Ok(())
    }

    async fn get_staff(&self, id: &str) -> Result<Option<Staff>, AppError> {
        Ok(self.staff.get(id).map(|s| s.clone()))
    }

    async fn upsert_staff(&self, staff: &Staff) -> Result<(), AppError> {
        self.staff.insert(staff.id.clone(), staff.clone());
        Ok(())
    }

    async fn next_sequence(&self, key: &str) -> Result<i64, AppError> {
        let mut counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), AppError> {
        insert_new(&self.orders, "Order", &order.id, order)
    }

    async fn get_order(&self, id: &str) -> Result<Option<Order>, AppError> {
        Ok(self.orders.get(id).map(|o| o.clone()))
    }

    async fn replace_order_if_version(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<(), AppError> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!("orders write rejected")));
        }
        replace_versioned(&self.orders, "Order", &order.id, order, expected_version, |o| {
            o.version
        })
    }

    async fn list_orders_assigned_to(
        &self,
        company_id: &str,
        engineer_id: &str,
    ) -> Result<Vec<Order>, AppError> {
        Ok(self
            .orders
            .iter()
            .filter(|o| {
                !o.is_deleted && o.company_id == company_id && o.engineer_id() == Some(engineer_id)
            })
            .map(|o| o.value().clone())
            .collect())
    }

    async fn insert_sub_task(&self, task: &SubTask) -> Result<(), AppError> {
        insert_new(&self.sub_tasks, "Sub-task", &task.id, task)
    }

    async fn get_sub_task(&self, id: &str) -> Result<Option<SubTask>, AppError> {
        Ok(self.sub_tasks.get(id).map(|t| t.clone()))
    }

    async fn replace_sub_task_if_version(
        &self,
        task: &SubTask,
        expected_version: i64,
    ) -> Result<(), AppError> {
        replace_versioned(
            &self.sub_tasks,
            "Sub-task",
            &task.id,
            task,
            expected_version,
            |t| t.version,
        )
    }

    async fn list_sub_tasks(&self, order_id: &str) -> Result<Vec<SubTask>, AppError> {
        let mut tasks: Vec<SubTask> = self
            .sub_tasks
            .iter()
            .filter(|t| t.order_id == order_id && !t.is_deleted)
            .map(|t| t.value().clone())
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn list_sub_tasks_assigned_to(
        &self,
        company_id: &str,
        staff_id: &str,
    ) -> Result<Vec<SubTask>, AppError> {
        Ok(self
            .sub_tasks
            .iter()
            .filter(|t| !t.is_deleted && t.company_id == company_id && t.assigned_to == staff_id)
            .map(|t| t.value().clone())
            .collect())
    }

    async fn soft_delete_sub_tasks_for_order(
        &self,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut count = 0;
        for mut task in self.sub_tasks.iter_mut() {
            if task.order_id == order_id && !task.is_deleted {
                task.is_deleted = true;
                task.deleted_at = Some(at);
                task.version += 1;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        match self.invoice_by_order.entry(invoice.order_id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(anyhow::anyhow!(
                "Order {} already has an active invoice",
                invoice.order_id
            ))),
            Entry::Vacant(slot) => {
                insert_new(&self.invoices, "Invoice", &invoice.id, invoice)?;
                slot.insert(invoice.id.clone());
                Ok(())
            }
        }
    }

    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices.get(id).map(|i| i.clone()))
    }

    async fn find_invoice_for_order(&self, order_id: &str) -> Result<Option<Invoice>, AppError> {
        let invoice_id = match self.invoice_by_order.get(order_id) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        Ok(self.invoices.get(&invoice_id).map(|i| i.clone()))
    }

    async fn replace_invoice_if_version(
        &self,
        invoice: &Invoice,
        expected_version: i64,
    ) -> Result<(), AppError> {
        if self.fail_invoices.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!("invoices write rejected")));
        }
        replace_versioned(
            &self.invoices,
            "Invoice",
            &invoice.id,
            invoice,
            expected_version,
            |i| i.version,
        )
    }

    async fn list_invoices_for_order(&self, order_id: &str) -> Result<Vec<Invoice>, AppError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|i| i.order_id == order_id && !i.is_deleted)
            .map(|i| i.value().clone())
            .collect();
        invoices.sort_by(|a, b| b.invoice_date.cmp(&a.invoice_date));
        Ok(invoices)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), AppError> {
        insert_new(&self.payments, "Payment", &payment.id, payment)
    }

    async fn get_payment(&self, id: &str) -> Result<Option<Payment>, AppError> {
        Ok(self.payments.get(id).map(|p| p.clone()))
    }

    async fn replace_payment_if_version(
        &self,
        payment: &Payment,
        expected_version: i64,
    ) -> Result<(), AppError> {
        replace_versioned(
            &self.payments,
            "Payment",
            &payment.id,
            payment,
            expected_version,
            |p| p.version,
        )
    }

    async fn list_payments_for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .map(|p| p.value().clone())
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn list_payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| p.order_id == order_id && !p.is_deleted)
            .map(|p| p.value().clone())
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn upsert_sale_record(&self, record: &SaleRecord) -> Result<(), AppError> {
        if self.fail_sale_records.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "sale_records write rejected"
            )));
        }
        self.sale_records
            .insert(record.invoice_id.clone(), record.clone());
        Ok(())
    }

    async fn get_sale_record(&self, invoice_id: &str) -> Result<Option<SaleRecord>, AppError> {
        Ok(self.sale_records.get(invoice_id).map(|r| r.clone()))
    }

    async fn insert_activity(&self, entry: &ActivityLog) -> Result<(), AppError> {
        if self.fail_activity.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "activity_logs write rejected"
            )));
        }
        insert_new(&self.activity, "Activity", &entry.id, entry)
    }

    async fn list_activity(&self, order_id: &str) -> Result<Vec<ActivityLog>, AppError> {
        let mut entries: Vec<ActivityLog> = self
            .activity
            .iter()
            .filter(|a| a.order_id == order_id && !a.is_deleted)
            .map(|a| a.value().clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn soft_delete_activity_for_order(&self, order_id: &str) -> Result<u64, AppError> {
        let mut count = 0;
        for mut entry in self.activity.iter_mut() {
            if entry.order_id == order_id && !entry.is_deleted {
                entry.is_deleted = true;
                count += 1;
            }
        }
        Ok(count)
    }
}
