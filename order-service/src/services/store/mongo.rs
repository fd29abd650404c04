use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, ReplaceOptions, ReturnDocument,
};
use mongodb::{Collection, Database, IndexModel};
use service_core::error::AppError;

use super::{version_conflict, Store};
use crate::models::{
    ActivityLog, Invoice, Order, Payment, SaleRecord, Stage, Staff, SubTask,
};
use crate::services::metrics::DB_QUERY_DURATION;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    stages: Collection<Stage>,
    staff: Collection<Staff>,
    counters: Collection<Document>,
    orders: Collection<Order>,
    sub_tasks: Collection<SubTask>,
    invoices: Collection<Invoice>,
    payments: Collection<Payment>,
    sale_records: Collection<SaleRecord>,
    activity: Collection<ActivityLog>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

fn named_index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(name.to_string()).build())
        .build()
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            stages: db.collection("stages"),
            staff: db.collection("staff"),
            counters: db.collection("counters"),
            orders: db.collection("orders"),
            sub_tasks: db.collection("sub_tasks"),
            invoices: db.collection("invoices"),
            payments: db.collection("payments"),
            sale_records: db.collection("sale_records"),
            activity: db.collection("activity_logs"),
        }
    }

    /// Initialize indexes for company-scoped lookups and the one-active-invoice rule.
    pub async fn init_indexes(&self) -> Result<(), AppError> {
        self.orders
            .create_indexes(
                [
                    IndexModel::builder()
                        .keys(doc! { "company_id": 1, "order_number": 1 })
                        .options(
                            IndexOptions::builder()
                                .name("company_order_number_idx".to_string())
                                .unique(true)
                                .build(),
                        )
                        .build(),
                    named_index(
                        doc! { "company_id": 1, "assignment.engineer_id": 1, "is_deleted": 1 },
                        "company_engineer_idx",
                    ),
                ],
                None,
            )
            .await?;

        self.sub_tasks
            .create_indexes(
                [
                    named_index(
                        doc! { "order_id": 1, "is_deleted": 1, "created_at": 1 },
                        "order_sub_task_idx",
                    ),
                    named_index(
                        doc! { "company_id": 1, "assigned_to": 1, "is_deleted": 1 },
                        "company_assignee_idx",
                    ),
                ],
                None,
            )
            .await?;

        // At most one active invoice per order.
        let active_invoice_index = IndexModel::builder()
            .keys(doc! { "order_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("active_invoice_per_order_idx".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "is_deleted": false })
                    .build(),
            )
            .build();
        self.invoices
            .create_indexes(
                [
                    active_invoice_index,
                    named_index(
                        doc! { "company_id": 1, "invoice_number": 1 },
                        "company_invoice_number_idx",
                    ),
                ],
                None,
            )
            .await?;

        self.payments
            .create_indexes(
                [
                    named_index(doc! { "invoice_id": 1, "created_at": 1 }, "invoice_payment_idx"),
                    named_index(doc! { "order_id": 1, "is_deleted": 1 }, "order_payment_idx"),
                ],
                None,
            )
            .await?;

        self.activity
            .create_indexes(
                [named_index(
                    doc! { "order_id": 1, "is_deleted": 1, "created_at": -1 },
                    "order_activity_idx",
                )],
                None,
            )
            .await?;

        tracing::info!("Order service indexes initialized");
        Ok(())
    }

    async fn replace_versioned<T>(
        collection: &Collection<T>,
        kind: &str,
        id: &str,
        value: &T,
        expected_version: i64,
    ) -> Result<(), AppError>
    where
        T: serde::Serialize + Send + Sync,
    {
        let _timer = DB_QUERY_DURATION
            .with_label_values(&["replace_if_version"])
            .start_timer();

        let result = collection
            .replace_one(doc! { "_id": id, "version": expected_version }, value, None)
            .await?;

        if result.matched_count == 0 {
            return Err(version_conflict(kind, id));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    async fn list_stages(&self) -> Result<Vec<Stage>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "sequence_order": 1 })
            .build();
        let cursor = self.stages.find(doc! {}, Some(options)).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_stages(&self, stages: &[Stage]) -> Result<(), AppError> {
        if stages.is_empty() {
            return Ok(());
        }
        self.stages.insert_many(stages, None).await?;
        Ok(())
    }

    async fn get_staff(&self, id: &str) -> Result<Option<Staff>, AppError> {
        Ok(self.staff.find_one(doc! { "_id": id }, None).await?)
    }

    async fn upsert_staff(&self, staff: &Staff) -> Result<(), AppError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.staff
            .replace_one(doc! { "_id": staff.id.as_str() }, staff, Some(options))
            .await?;
        Ok(())
    }

    async fn next_sequence(&self, key: &str) -> Result<i64, AppError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters
            .find_one_and_update(
                doc! { "_id": key },
                doc! { "$inc": { "seq": 1_i64 } },
                Some(options),
            )
            .await?
            .ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!("Counter {} was not upserted", key))
            })?;

        counter
            .get_i64("seq")
            .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), AppError> {
        let _timer = DB_QUERY_DURATION
            .with_label_values(&["insert_order"])
            .start_timer();
        self.orders.insert_one(order, None).await?;
        Ok(())
    }

    async fn get_order(&self, id: &str) -> Result<Option<Order>, AppError> {
        let _timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();
        Ok(self.orders.find_one(doc! { "_id": id }, None).await?)
    }

    async fn replace_order_if_version(
        &self,
        order: &Order,
        expected_version: i64,
    ) -> Result<(), AppError> {
        Self::replace_versioned(&self.orders, "Order", &order.id, order, expected_version).await
    }

    async fn list_orders_assigned_to(
        &self,
        company_id: &str,
        engineer_id: &str,
    ) -> Result<Vec<Order>, AppError> {
        let filter = doc! {
            "company_id": company_id,
            "assignment.engineer_id": engineer_id,
            "is_deleted": false,
        };
        let cursor = self.orders.find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_sub_task(&self, task: &SubTask) -> Result<(), AppError> {
        self.sub_tasks.insert_one(task, None).await?;
        Ok(())
    }

    async fn get_sub_task(&self, id: &str) -> Result<Option<SubTask>, AppError> {
        Ok(self.sub_tasks.find_one(doc! { "_id": id }, None).await?)
    }

    async fn replace_sub_task_if_version(
        &self,
        task: &SubTask,
        expected_version: i64,
    ) -> Result<(), AppError> {
        Self::replace_versioned(&self.sub_tasks, "Sub-task", &task.id, task, expected_version)
            .await
    }

    async fn list_sub_tasks(&self, order_id: &str) -> Result<Vec<SubTask>, AppError> {
        let _timer = DB_QUERY_DURATION
            .with_label_values(&["list_sub_tasks"])
            .start_timer();
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self
            .sub_tasks
            .find(doc! { "order_id": order_id, "is_deleted": false }, Some(options))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_sub_tasks_assigned_to(
        &self,
        company_id: &str,
        staff_id: &str,
    ) -> Result<Vec<SubTask>, AppError> {
        let filter = doc! {
            "company_id": company_id,
            "assigned_to": staff_id,
            "is_deleted": false,
        };
        let cursor = self.sub_tasks.find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn soft_delete_sub_tasks_for_order(
        &self,
        order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = self
            .sub_tasks
            .update_many(
                doc! { "order_id": order_id, "is_deleted": false },
                doc! {
                    "$set": { "is_deleted": true, "deleted_at": at.to_rfc3339() },
                    "$inc": { "version": 1_i64 },
                },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        match self.invoices.insert_one(invoice, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(anyhow::anyhow!(
                "Order {} already has an active invoice",
                invoice.order_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self.invoices.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_invoice_for_order(&self, order_id: &str) -> Result<Option<Invoice>, AppError> {
        Ok(self
            .invoices
            .find_one(doc! { "order_id": order_id, "is_deleted": false }, None)
            .await?)
    }

    async fn replace_invoice_if_version(
        &self,
        invoice: &Invoice,
        expected_version: i64,
    ) -> Result<(), AppError> {
        Self::replace_versioned(&self.invoices, "Invoice", &invoice.id, invoice, expected_version)
            .await
    }

    async fn list_invoices_for_order(&self, order_id: &str) -> Result<Vec<Invoice>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "invoice_date": -1 })
            .build();
        let cursor = self
            .invoices
            .find(doc! { "order_id": order_id, "is_deleted": false }, Some(options))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), AppError> {
        self.payments.insert_one(payment, None).await?;
        Ok(())
    }

    async fn get_payment(&self, id: &str) -> Result<Option<Payment>, AppError> {
        Ok(self.payments.find_one(doc! { "_id": id }, None).await?)
    }

    async fn replace_payment_if_version(
        &self,
        payment: &Payment,
        expected_version: i64,
    ) -> Result<(), AppError> {
        Self::replace_versioned(&self.payments, "Payment", &payment.id, payment, expected_version)
            .await
    }

    async fn list_payments_for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self
            .payments
            .find(doc! { "invoice_id": invoice_id }, Some(options))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, AppError> {
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self
            .payments
            .find(doc! { "order_id": order_id, "is_deleted": false }, Some(options))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert_sale_record(&self, record: &SaleRecord) -> Result<(), AppError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.sale_records
            .replace_one(doc! { "_id": record.invoice_id.as_str() }, record, Some(options))
            .await?;
        Ok(())
    }

    async fn get_sale_record(&self, invoice_id: &str) -> Result<Option<SaleRecord>, AppError> {
        Ok(self
            .sale_records
            .find_one(doc! { "_id": invoice_id }, None)
            .await?)
    }

    async fn insert_activity(&self, entry: &ActivityLog) -> Result<(), AppError> {
        self.activity.insert_one(entry, None).await?;
        Ok(())
    }

    async fn list_activity(&self, order_id: &str) -> Result<Vec<ActivityLog>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let cursor = self
            .activity
            .find(doc! { "order_id": order_id, "is_deleted": false }, Some(options))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn soft_delete_activity_for_order(&self, order_id: &str) -> Result<u64, AppError> {
        let result = self
            .activity
            .update_many(
                doc! { "order_id": order_id, "is_deleted": false },
                doc! { "$set": { "is_deleted": true } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }
}
