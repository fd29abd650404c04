//! Ledger sync: invoices, payments and sale records derived from an order.
//!
//! The invoice is the transaction boundary. A payment counts once its id is in the
//! invoice's `applied_payment_ids`; the order's payment fields and the sale record are
//! projections of the invoice that can be re-derived at any time with
//! [`Ledger::reconcile_invoice`].

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::retry::{retry_on_conflict, RetryPolicy};
use std::sync::Arc;
use tracing::{info, instrument, warn, Span};
use uuid::Uuid;

use crate::models::{
    ActivityLog, ActivityType, Actor, Invoice, InvoiceItem, Order, Payment, PaymentMethod,
    PaymentRecordStatus, SaleRecord, SaleType, TaxType,
};
use crate::services::activity::ActivitySink;
use crate::services::metrics::{record_conflict_retry, record_operation, record_payment};
use crate::services::numbering;
use crate::services::store::{load_invoice, load_order, load_payment, Store};
use crate::services::totals::{
    classify_payment, compute_item_amounts, compute_totals, distribute_discount, BillLine, Totals,
};

/// Pending payments younger than this are assumed to be in flight.
const PENDING_GRACE: chrono::Duration = chrono::Duration::seconds(60);

/// Overrides for invoice generation. Unset fields fall back to the order's own values.
#[derive(Debug, Clone, Default)]
pub struct InvoiceRequest {
    pub order_id: String,
    pub gst_rate: Option<Decimal>,
    pub tax_type: Option<TaxType>,
    /// Fixed amount replacing the per-item and order discounts.
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
}

impl InvoiceRequest {
    pub fn for_order(order_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub invoice_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payment_date: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

pub struct Ledger {
    store: Arc<dyn Store>,
    activity: Arc<dyn ActivitySink>,
    retry: RetryPolicy,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, activity: Arc<dyn ActivitySink>, retry: RetryPolicy) -> Self {
        Self {
            store,
            activity,
            retry,
        }
    }

    /// Create or refresh the order's invoice from its current items.
    #[instrument(skip(self, actor, request), fields(order_id = %request.order_id, invoice_id))]
    pub async fn generate_invoice(
        &self,
        actor: &Actor,
        request: InvoiceRequest,
    ) -> Result<Invoice, AppError> {
        let result = self.generate_invoice_inner(actor, &request).await;
        record_operation("generate_invoice", &result);
        result
    }

    async fn generate_invoice_inner(
        &self,
        actor: &Actor,
        request: &InvoiceRequest,
    ) -> Result<Invoice, AppError> {
        if let Some(rate) = request.gst_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "GST rate must be between 0 and 100"
                )));
            }
        }
        if request.discount.is_some_and(|d| d < Decimal::ZERO) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount cannot be negative"
            )));
        }

        let order = load_order(self.store.as_ref(), &actor.company_id, &request.order_id).await?;
        let gst_rate = request.gst_rate.unwrap_or(order.tax_rate);
        let tax_type = request
            .tax_type
            .unwrap_or_else(|| TaxType::from_inter_state(order.is_inter_state));
        let (items, totals) = invoice_lines(&order, gst_rate, tax_type, request.discount)?;

        let store = self.store.as_ref();
        let (items, totals, order) = (&items, &totals, &order);
        let (invoice, created) = retry_on_conflict(
            &self.retry,
            "generate_invoice",
            |_| record_conflict_retry("generate_invoice"),
            move || async move {
                let now = Utc::now();
                match store.find_invoice_for_order(&order.id).await? {
                    Some(mut invoice) => {
                        let expected = invoice.version;
                        apply_totals(&mut invoice, items, totals, gst_rate, tax_type);
                        if request.notes.is_some() {
                            invoice.notes = request.notes.clone();
                        }
                        invoice.customer = order.customer.clone();
                        let payments = store.list_payments_for_invoice(&invoice.id).await?;
                        settle(&mut invoice, &payments);
                        invoice.version += 1;
                        invoice.updated_at = now;
                        store.replace_invoice_if_version(&invoice, expected).await?;
                        Ok((invoice, false))
                    }
                    None => {
                        let key = numbering::invoice_counter_key(&order.company_id, now);
                        let sequence = store.next_sequence(&key).await?;
                        let mut invoice = Invoice {
                            id: Uuid::new_v4().to_string(),
                            company_id: order.company_id.clone(),
                            invoice_number: numbering::format_invoice_number(now, sequence),
                            order_id: order.id.clone(),
                            order_number: order.order_number.clone(),
                            customer: order.customer.clone(),
                            items: Vec::new(),
                            gst_rate,
                            tax_type,
                            subtotal: Decimal::ZERO,
                            discount: Decimal::ZERO,
                            taxable_amount: Decimal::ZERO,
                            cgst: Decimal::ZERO,
                            sgst: Decimal::ZERO,
                            igst: Decimal::ZERO,
                            total_tax: Decimal::ZERO,
                            total_amount: Decimal::ZERO,
                            round_off: Decimal::ZERO,
                            final_amount: Decimal::ZERO,
                            paid_amount: Decimal::ZERO,
                            balance_amount: Decimal::ZERO,
                            payment_status: Default::default(),
                            applied_payment_ids: Vec::new(),
                            invoice_date: now,
                            notes: request.notes.clone(),
                            created_by: actor.id.clone(),
                            created_at: now,
                            updated_at: now,
                            version: 1,
                            is_deleted: false,
                        };
                        apply_totals(&mut invoice, items, totals, gst_rate, tax_type);
                        settle(&mut invoice, &[]);
                        // A concurrent generator may have won the unique index; the retry
                        // picks up its invoice through the update branch.
                        store.insert_invoice(&invoice).await?;
                        Ok((invoice, true))
                    }
                }
            },
        )
        .await?;

        Span::current().record("invoice_id", invoice.id.as_str());
        let order = self.project(&invoice).await?;

        let mut invoice = invoice;
        if created && order.financials.advance_payment > Decimal::ZERO {
            // Advance taken on the order before it had an invoice.
            let carried = order.financials.advance_payment.min(invoice.balance_amount);
            if carried > Decimal::ZERO {
                let (_, updated) = self
                    .record_payment_inner(
                        actor,
                        &PaymentRequest {
                            invoice_id: invoice.id.clone(),
                            amount: carried,
                            method: PaymentMethod::Other,
                            payment_date: None,
                            reference: None,
                            notes: Some("Advance carried over from order".to_string()),
                        },
                    )
                    .await?;
                invoice = updated;
            }
        }

        info!(
            invoice_number = %invoice.invoice_number,
            final_amount = %invoice.final_amount,
            created,
            "Invoice generated"
        );

        let verb = if created { "generated" } else { "updated" };
        self.activity.record(
            ActivityLog::new(
                &order.company_id,
                &order.id,
                &order.order_number,
                ActivityType::InvoiceGenerated,
                "Invoice Generated",
                format!(
                    "Invoice {} {} for ₹{}",
                    invoice.invoice_number, verb, invoice.final_amount
                ),
            )
            .by(&actor.id, &actor.name)
            .at_stage(&order.stage_id, &order.stage_name)
            .with_metadata(serde_json::json!({
                "invoice_id": invoice.id,
                "invoice_number": invoice.invoice_number,
                "final_amount": invoice.final_amount,
            })),
        );

        Ok(invoice)
    }

    /// Apply a payment to an invoice and propagate it to the order and sale record.
    #[instrument(skip(self, actor, request), fields(invoice_id = %request.invoice_id, payment_id))]
    pub async fn record_payment(
        &self,
        actor: &Actor,
        request: PaymentRequest,
    ) -> Result<(Payment, Invoice), AppError> {
        let result = self.record_payment_inner(actor, &request).await;
        record_operation("record_payment", &result);
        result
    }

    async fn record_payment_inner(
        &self,
        actor: &Actor,
        request: &PaymentRequest,
    ) -> Result<(Payment, Invoice), AppError> {
        let amount = request.amount;
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be greater than zero"
            )));
        }

        let invoice = load_invoice(self.store.as_ref(), &actor.company_id, &request.invoice_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::PreconditionFailed(anyhow::anyhow!(
                    "Invoice {} not found for payment",
                    request.invoice_id
                )),
                other => other,
            })?;
        check_balance(&invoice, amount)?;

        let now = Utc::now();
        let key = numbering::payment_counter_key(&invoice.company_id, now);
        let sequence = self.store.next_sequence(&key).await?;
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            company_id: invoice.company_id.clone(),
            payment_number: numbering::format_payment_number(now, sequence),
            invoice_id: invoice.id.clone(),
            invoice_number: invoice.invoice_number.clone(),
            order_id: invoice.order_id.clone(),
            order_number: invoice.order_number.clone(),
            customer_name: invoice.customer.name.clone(),
            amount,
            method: request.method,
            payment_date: request.payment_date.unwrap_or(now),
            reference: request.reference.clone(),
            notes: request.notes.clone(),
            status: PaymentRecordStatus::Pending,
            recorded_by: actor.id.clone(),
            recorded_by_name: actor.name.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
            is_deleted: false,
            deleted_at: None,
        };
        Span::current().record("payment_id", payment.id.as_str());
        self.store.insert_payment(&payment).await?;

        let store = self.store.as_ref();
        let (invoice_id, payment_id) = (invoice.id.as_str(), payment.id.as_str());
        let applied = retry_on_conflict(
            &self.retry,
            "record_payment",
            |_| record_conflict_retry("record_payment"),
            move || async move {
                let mut invoice = store
                    .get_invoice(invoice_id)
                    .await?
                    .filter(|i| !i.is_deleted)
                    .ok_or_else(|| {
                        AppError::PreconditionFailed(anyhow::anyhow!("Invoice {} not found", invoice_id))
                    })?;
                check_balance(&invoice, amount)?;

                let expected = invoice.version;
                invoice.applied_payment_ids.push(payment_id.to_string());
                invoice.paid_amount += amount;
                invoice.balance_amount = invoice.final_amount - invoice.paid_amount;
                invoice.payment_status = classify_payment(invoice.paid_amount, invoice.final_amount);
                invoice.version += 1;
                invoice.updated_at = Utc::now();
                store.replace_invoice_if_version(&invoice, expected).await?;
                Ok(invoice)
            },
        )
        .await;

        let invoice = match applied {
            Ok(invoice) => invoice,
            Err(e) => {
                if let Err(err) = self
                    .set_payment_status(payment_id, PaymentRecordStatus::Failed)
                    .await
                {
                    warn!(error = %err, "Failed to mark unapplied payment as failed");
                }
                return Err(e);
            }
        };

        let payment = match self
            .set_payment_status(payment_id, PaymentRecordStatus::Completed)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                // Applied ids keep the payment counted; the reconciler completes it.
                warn!(error = %e, "Payment applied but status update failed");
                payment
            }
        };

        if let Err(e) = self.propagate(&invoice).await {
            warn!(error = %e, "Payment propagation failed, compensating");
            self.compensate(&payment).await;
            record_payment("compensated");
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Payment could not be applied; no changes were kept"
            )));
        }

        record_payment("recorded");
        info!(
            payment_number = %payment.payment_number,
            amount = %amount,
            balance = %invoice.balance_amount,
            "Payment recorded"
        );

        self.activity.record(
            ActivityLog::new(
                &invoice.company_id,
                &invoice.order_id,
                &invoice.order_number,
                ActivityType::PaymentAdded,
                "Payment Added",
                format!(
                    "Payment of ₹{} received via {}. Balance: ₹{}",
                    amount,
                    payment.method.as_str(),
                    invoice.balance_amount
                ),
            )
            .by(&actor.id, &actor.name)
            .with_metadata(serde_json::json!({
                "payment_id": payment.id,
                "payment_number": payment.payment_number,
                "amount": amount,
                "method": payment.method.as_str(),
                "balance": invoice.balance_amount,
            })),
        );

        Ok((payment, invoice))
    }

    /// Soft-delete a payment and recompute the invoice from the remaining payment set.
    #[instrument(skip(self, actor), fields(payment_id = %payment_id))]
    pub async fn delete_payment(&self, actor: &Actor, payment_id: &str) -> Result<Invoice, AppError> {
        let result = self.delete_payment_inner(actor, payment_id).await;
        record_operation("delete_payment", &result);
        result
    }

    async fn delete_payment_inner(&self, actor: &Actor, payment_id: &str) -> Result<Invoice, AppError> {
        let payment = load_payment(self.store.as_ref(), &actor.company_id, payment_id).await?;

        self.set_payment_deleted(payment_id, true).await?;
        let invoice = self.recompute_invoice(&payment.invoice_id).await?;

        if let Err(e) = self.propagate(&invoice).await {
            warn!(error = %e, "Projection failed after payment deletion, restoring payment");
            if let Err(err) = self.set_payment_deleted(payment_id, false).await {
                warn!(error = %err, "Failed to restore deleted payment");
            }
            match self.recompute_invoice(&payment.invoice_id).await {
                Ok(restored) => {
                    if let Err(err) = self.propagate(&restored).await {
                        warn!(error = %err, "Re-projection failed; reconcile invoice {}", restored.id);
                    }
                }
                Err(err) => warn!(error = %err, "Failed to restore invoice after deletion"),
            }
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Payment could not be deleted; no changes were kept"
            )));
        }

        record_payment("deleted");
        info!(invoice_id = %invoice.id, paid = %invoice.paid_amount, "Payment deleted");

        self.activity.record(
            ActivityLog::new(
                &invoice.company_id,
                &invoice.order_id,
                &invoice.order_number,
                ActivityType::PaymentDeleted,
                "Payment Deleted",
                format!(
                    "Payment {} of ₹{} deleted. Balance: ₹{}",
                    payment.payment_number, payment.amount, invoice.balance_amount
                ),
            )
            .by(&actor.id, &actor.name)
            .with_metadata(serde_json::json!({
                "payment_id": payment.id,
                "amount": payment.amount,
                "balance": invoice.balance_amount,
            })),
        );

        Ok(invoice)
    }

    /// Resolve stale pending payments, recompute the invoice and re-project it.
    #[instrument(skip(self, actor), fields(invoice_id = %invoice_id))]
    pub async fn reconcile_invoice(&self, actor: &Actor, invoice_id: &str) -> Result<Invoice, AppError> {
        let result: Result<Invoice, AppError> = async {
            let invoice = load_invoice(self.store.as_ref(), &actor.company_id, invoice_id).await?;
            let cutoff = Utc::now() - PENDING_GRACE;

            for payment in self.store.list_payments_for_invoice(invoice_id).await? {
                if payment.is_deleted || payment.status != PaymentRecordStatus::Pending {
                    continue;
                }
                if invoice.has_applied(&payment.id) {
                    self.set_payment_status(&payment.id, PaymentRecordStatus::Completed)
                        .await?;
                } else if payment.created_at < cutoff {
                    self.set_payment_status(&payment.id, PaymentRecordStatus::Failed)
                        .await?;
                }
            }

            let invoice = self.recompute_invoice(invoice_id).await?;
            self.propagate(&invoice).await?;
            info!(paid = %invoice.paid_amount, "Invoice reconciled");
            Ok(invoice)
        }
        .await;
        record_operation("reconcile_invoice", &result);
        result
    }

    pub async fn get_invoice(&self, actor: &Actor, invoice_id: &str) -> Result<Invoice, AppError> {
        load_invoice(self.store.as_ref(), &actor.company_id, invoice_id).await
    }

    pub async fn list_invoices_for_order(
        &self,
        actor: &Actor,
        order_id: &str,
    ) -> Result<Vec<Invoice>, AppError> {
        load_order(self.store.as_ref(), &actor.company_id, order_id).await?;
        self.store.list_invoices_for_order(order_id).await
    }

    pub async fn list_payments_for_order(
        &self,
        actor: &Actor,
        order_id: &str,
    ) -> Result<Vec<Payment>, AppError> {
        load_order(self.store.as_ref(), &actor.company_id, order_id).await?;
        self.store.list_payments_for_order(order_id).await
    }

    /// Project the invoice onto its order and sale record.
    async fn propagate(&self, invoice: &Invoice) -> Result<(), AppError> {
        let order = self.project(invoice).await?;
        self.store
            .upsert_sale_record(&sale_record(invoice, &order))
            .await
    }

    async fn project(&self, invoice: &Invoice) -> Result<Order, AppError> {
        let store = self.store.as_ref();
        let order = retry_on_conflict(
            &self.retry,
            "project_order",
            |_| record_conflict_retry("project_order"),
            move || async move {
                let mut order = store.get_order(&invoice.order_id).await?.ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Order {} not found", invoice.order_id))
                })?;
                let expected = order.version;
                order.invoice_id = Some(invoice.id.clone());
                order.invoice_number = Some(invoice.invoice_number.clone());
                order.financials.final_cost = Some(invoice.final_amount);
                order.financials.advance_payment = invoice.paid_amount;
                order.financials.balance_payment = invoice.balance_amount;
                order.financials.payment_status = invoice.payment_status;
                order.version += 1;
                order.updated_at = Utc::now();
                store.replace_order_if_version(&order, expected).await?;
                Ok(order)
            },
        )
        .await?;

        Ok(order)
    }

    /// Undo a payment that reached the invoice but whose projections failed.
    async fn compensate(&self, payment: &Payment) {
        let store = self.store.as_ref();
        let reverted = retry_on_conflict(
            &self.retry,
            "compensate_payment",
            |_| record_conflict_retry("compensate_payment"),
            move || async move {
                let mut invoice = store.get_invoice(&payment.invoice_id).await?.ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Invoice {} not found", payment.invoice_id))
                })?;
                let expected = invoice.version;
                invoice.applied_payment_ids.retain(|id| id != &payment.id);
                invoice.paid_amount -= payment.amount;
                invoice.balance_amount = invoice.final_amount - invoice.paid_amount;
                invoice.payment_status = classify_payment(invoice.paid_amount, invoice.final_amount);
                invoice.version += 1;
                invoice.updated_at = Utc::now();
                store.replace_invoice_if_version(&invoice, expected).await?;
                Ok(invoice)
            },
        )
        .await;

        if let Err(e) = self
            .set_payment_status(&payment.id, PaymentRecordStatus::Failed)
            .await
        {
            warn!(error = %e, payment_id = %payment.id, "Failed to mark compensated payment");
        }

        match reverted {
            Ok(invoice) => {
                if let Err(e) = self.propagate(&invoice).await {
                    warn!(error = %e, invoice_id = %invoice.id, "Re-projection after compensation failed");
                }
            }
            Err(e) => warn!(error = %e, payment_id = %payment.id, "Failed to revert invoice"),
        }
    }

    /// Recompute paid and balance amounts from the invoice's settled payments.
    async fn recompute_invoice(&self, invoice_id: &str) -> Result<Invoice, AppError> {
        let store = self.store.as_ref();
        retry_on_conflict(
            &self.retry,
            "recompute_invoice",
            |_| record_conflict_retry("recompute_invoice"),
            move || async move {
                let mut invoice = store.get_invoice(invoice_id).await?.ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id))
                })?;
                let payments = store.list_payments_for_invoice(invoice_id).await?;
                let expected = invoice.version;
                settle(&mut invoice, &payments);
                invoice.version += 1;
                invoice.updated_at = Utc::now();
                store.replace_invoice_if_version(&invoice, expected).await?;
                Ok(invoice)
            },
        )
        .await
    }

    async fn set_payment_status(
        &self,
        payment_id: &str,
        status: PaymentRecordStatus,
    ) -> Result<Payment, AppError> {
        self.update_payment("set_payment_status", payment_id, move |p| {
            if p.status == status {
                return false;
            }
            p.status = status;
            true
        })
        .await
    }

    async fn set_payment_deleted(&self, payment_id: &str, deleted: bool) -> Result<Payment, AppError> {
        self.update_payment("set_payment_deleted", payment_id, move |p| {
            if p.is_deleted == deleted {
                return false;
            }
            p.is_deleted = deleted;
            p.deleted_at = deleted.then(Utc::now);
            true
        })
        .await
    }

    async fn update_payment<F>(
        &self,
        operation: &'static str,
        payment_id: &str,
        mutate: F,
    ) -> Result<Payment, AppError>
    where
        F: Fn(&mut Payment) -> bool + Copy,
    {
        let store = self.store.as_ref();
        retry_on_conflict(
            &self.retry,
            operation,
            |_| record_conflict_retry(operation),
            move || async move {
                let mut payment = store.get_payment(payment_id).await?.ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id))
                })?;
                let expected = payment.version;
                if !mutate(&mut payment) {
                    return Ok(payment);
                }
                payment.version += 1;
                payment.updated_at = Utc::now();
                store.replace_payment_if_version(&payment, expected).await?;
                Ok(payment)
            },
        )
        .await
    }
}

fn check_balance(invoice: &Invoice, amount: Decimal) -> Result<(), AppError> {
    if amount > invoice.balance_amount {
        return Err(AppError::PreconditionFailed(anyhow::anyhow!(
            "Payment amount ₹{} exceeds balance amount ₹{}",
            amount,
            invoice.balance_amount
        )));
    }
    Ok(())
}

/// A payment counts toward the invoice when it is live and either completed or applied
/// but not yet marked completed.
fn is_settled(invoice: &Invoice, payment: &Payment) -> bool {
    !payment.is_deleted
        && payment.invoice_id == invoice.id
        && match payment.status {
            PaymentRecordStatus::Completed => true,
            PaymentRecordStatus::Pending => invoice.has_applied(&payment.id),
            PaymentRecordStatus::Failed | PaymentRecordStatus::Refunded => false,
        }
}

fn settle(invoice: &mut Invoice, payments: &[Payment]) {
    let paid: Decimal = payments
        .iter()
        .filter(|p| is_settled(invoice, p))
        .map(|p| p.amount)
        .sum();
    invoice.paid_amount = paid;
    invoice.balance_amount = invoice.final_amount - paid;
    invoice.payment_status = classify_payment(paid, invoice.final_amount);
}

fn apply_totals(
    invoice: &mut Invoice,
    items: &[InvoiceItem],
    totals: &Totals,
    gst_rate: Decimal,
    tax_type: TaxType,
) {
    invoice.items = items.to_vec();
    invoice.gst_rate = gst_rate;
    invoice.tax_type = tax_type;
    invoice.subtotal = totals.subtotal;
    invoice.discount = totals.discount;
    invoice.taxable_amount = totals.taxable_amount;
    invoice.cgst = totals.cgst;
    invoice.sgst = totals.sgst;
    invoice.igst = totals.igst;
    invoice.total_tax = totals.total_tax;
    invoice.total_amount = totals.total_amount;
    invoice.round_off = totals.round_off;
    invoice.final_amount = totals.final_amount;
}

/// Invoice lines and totals for an order at the given GST rate.
///
/// With a discount override the amount is split across lines by unit price share and
/// replaces both the item discounts and the order-level discount.
pub fn invoice_lines(
    order: &Order,
    gst_rate: Decimal,
    tax_type: TaxType,
    discount_override: Option<Decimal>,
) -> Result<(Vec<InvoiceItem>, Totals), AppError> {
    let mut lines: Vec<BillLine> = order.items.iter().map(BillLine::from).collect();
    for line in lines.iter_mut() {
        line.tax_rate = gst_rate;
    }

    let additional_discount = match discount_override {
        Some(discount) => {
            let prices: Vec<Decimal> = lines.iter().map(|l| l.unit_price).collect();
            for (line, share) in lines.iter_mut().zip(distribute_discount(&prices, discount)) {
                line.discount = share;
            }
            Decimal::ZERO
        }
        None => order.financials.additional_discount,
    };

    let totals = compute_totals(&lines, additional_discount, gst_rate, tax_type.is_inter_state());
    if totals.taxable_amount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount ₹{} exceeds subtotal ₹{}",
            totals.discount,
            totals.subtotal
        )));
    }

    let items = order
        .items
        .iter()
        .zip(lines.iter())
        .map(|(item, line)| {
            let amounts =
                compute_item_amounts(line.quantity, line.unit_price, line.discount, line.tax_rate);
            InvoiceItem {
                description: item.name().to_string(),
                item_kind: item.kind().to_string(),
                quantity: item.quantity(),
                unit_price: line.unit_price,
                discount: line.discount,
                taxable_amount: amounts.taxable_amount,
                tax_rate: line.tax_rate,
                tax_amount: amounts.tax_amount,
                total_amount: amounts.total_amount,
            }
        })
        .collect();

    Ok((items, totals))
}

/// Reporting snapshot of an invoice, tagged with its Indian fiscal period.
pub fn sale_record(invoice: &Invoice, order: &Order) -> SaleRecord {
    let date = invoice.invoice_date;
    let sale_type = match (order.has_services(), order.has_products()) {
        (true, true) => SaleType::Both,
        (false, true) => SaleType::Product,
        _ => SaleType::Service,
    };

    SaleRecord {
        invoice_id: invoice.id.clone(),
        company_id: invoice.company_id.clone(),
        sale_number: numbering::sale_number(&invoice.invoice_number),
        sale_date: date,
        financial_year: numbering::financial_year(date),
        month: date.month(),
        quarter: numbering::quarter(date.month()),
        customer_id: invoice.customer.customer_id.clone(),
        customer_name: invoice.customer.name.clone(),
        customer_gstin: invoice.customer.gstin.clone(),
        customer_state: invoice.customer.state.clone(),
        invoice_number: invoice.invoice_number.clone(),
        order_id: invoice.order_id.clone(),
        order_number: invoice.order_number.clone(),
        items_value: invoice.subtotal,
        discount: invoice.discount,
        taxable_value: invoice.taxable_amount,
        cgst: invoice.cgst,
        sgst: invoice.sgst,
        igst: invoice.igst,
        total_gst: invoice.total_tax,
        total_amount: invoice.total_amount,
        round_off: invoice.round_off,
        final_amount: invoice.final_amount,
        paid_amount: invoice.paid_amount,
        balance_amount: invoice.balance_amount,
        payment_status: invoice.payment_status,
        gst_rate: invoice.gst_rate,
        tax_type: invoice.tax_type,
        sale_type,
        created_by: invoice.created_by.clone(),
        updated_at: invoice.updated_at,
    }
}
