use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use tracing::{info, instrument, Span};
use uuid::Uuid;
use validator::Validate;

use super::{push_stage, LifecycleEngine};
use crate::models::stage;
use crate::models::{
    ActivityLog, ActivityType, Actor, AppendLog, Assignment, CustomerSnapshot, Financials,
    LineItem, NoteEntry, NoteKind, Order, OrderStatus, OrderType, PaymentMethod, Priority, Staff,
    StaffRole, StageHistoryEntry, SubTaskRollup, WorkItem,
};
use crate::services::ledger::{InvoiceRequest, PaymentRequest};
use crate::services::metrics::{record_operation, record_stage_transition};
use crate::services::numbering;
use crate::services::store::load_order;
use crate::services::totals::{classify_payment, compute_totals, refresh_item_amounts, BillLine, Totals};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewOrder {
    pub customer: CustomerSnapshot,
    pub device: Option<serde_json::Value>,
    pub problem_description: Option<String>,
    #[validate(length(min = 1, message = "At least one service or product is required"))]
    pub items: Vec<LineItem>,
    /// Order-level GST rate; the configured default applies when absent.
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub is_inter_state: bool,
    /// Order-level discount on top of item discounts.
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub priority: Priority,
    pub engineer_id: Option<String>,
    #[serde(default)]
    pub advance_payment: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub expected_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderItemsUpdate {
    #[validate(length(min = 1, message = "At least one service or product is required"))]
    pub items: Vec<LineItem>,
    pub discount: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub is_inter_state: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

fn bad_request(message: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("{}", message))
}

fn validate_items(items: &[LineItem]) -> Result<(), AppError> {
    for item in items {
        if item.name().trim().is_empty() {
            return Err(bad_request("Item name is required"));
        }
        if item.quantity() <= 0 {
            return Err(bad_request(format!(
                "Quantity for '{}' must be greater than zero",
                item.name()
            )));
        }
        if item.billable_unit_price() < Decimal::ZERO || item.discount() < Decimal::ZERO {
            return Err(bad_request(format!(
                "Price and discount for '{}' cannot be negative",
                item.name()
            )));
        }
        validate_rate(item.tax_rate())?;
    }
    Ok(())
}

fn validate_rate(rate: Decimal) -> Result<(), AppError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(bad_request("Tax rate must be between 0 and 100"));
    }
    Ok(())
}

fn order_totals(
    items: &[LineItem],
    discount: Decimal,
    tax_rate: Decimal,
    is_inter_state: bool,
) -> Result<Totals, AppError> {
    if discount < Decimal::ZERO {
        return Err(bad_request("Discount cannot be negative"));
    }
    let lines: Vec<BillLine> = items.iter().map(BillLine::from).collect();
    let totals = compute_totals(&lines, discount, tax_rate, is_inter_state);
    if totals.taxable_amount < Decimal::ZERO {
        return Err(bad_request(format!(
            "Discount ₹{} exceeds subtotal ₹{}",
            totals.discount, totals.subtotal
        )));
    }
    Ok(totals)
}

/// Copy computed totals onto the order and re-derive balance and status.
fn apply_totals(financials: &mut Financials, totals: &Totals, additional_discount: Decimal) {
    financials.subtotal = totals.subtotal;
    financials.additional_discount = additional_discount;
    financials.discount = totals.discount;
    financials.taxable_amount = totals.taxable_amount;
    financials.cgst = totals.cgst;
    financials.sgst = totals.sgst;
    financials.igst = totals.igst;
    financials.total_tax = totals.total_tax;
    financials.total_amount = totals.total_amount;
    financials.round_off = totals.round_off;
    financials.estimated_cost = totals.final_amount;
    refresh_balance(financials);
}

fn refresh_balance(financials: &mut Financials) {
    let payable = financials.payable();
    financials.balance_payment = payable - financials.advance_payment;
    financials.payment_status = classify_payment(financials.advance_payment, payable);
}

fn require_engineer(staff: &Staff) -> Result<(), AppError> {
    if staff.role != StaffRole::Engineer {
        return Err(AppError::PreconditionFailed(anyhow::anyhow!(
            "{} is not an engineer",
            staff.full_name
        )));
    }
    Ok(())
}

/// History entry at the order's current stage.
fn note_history(order: &mut Order, actor: &Actor, assigned_to: Option<String>, notes: String) {
    order.stage_history.append(StageHistoryEntry {
        stage_id: order.stage_id.clone(),
        stage_name: order.stage_name.clone(),
        stage_slug: order.stage_slug.clone(),
        changed_by: actor.id.clone(),
        changed_by_name: actor.name.clone(),
        assigned_to,
        changed_at: Utc::now(),
        notes,
    });
}

impl LifecycleEngine {
    #[instrument(skip(self, actor, input), fields(company_id = %actor.company_id, order_id))]
    pub async fn create_order(&self, actor: &Actor, input: NewOrder) -> Result<Order, AppError> {
        let result = self.create_order_inner(actor, input).await;
        record_operation("create_order", &result);
        result
    }

    async fn create_order_inner(&self, actor: &Actor, input: NewOrder) -> Result<Order, AppError> {
        input.validate()?;
        if input.customer.name.trim().is_empty() {
            return Err(bad_request("Customer name is required"));
        }
        validate_items(&input.items)?;
        let tax_rate = input.tax_rate.unwrap_or(self.default_tax_rate);
        validate_rate(tax_rate)?;
        if input.advance_payment < Decimal::ZERO {
            return Err(bad_request("Advance payment cannot be negative"));
        }

        let mut items = input.items;
        refresh_item_amounts(&mut items);
        let totals = order_totals(&items, input.discount, tax_rate, input.is_inter_state)?;
        if input.advance_payment > totals.final_amount {
            return Err(bad_request(format!(
                "Advance payment ₹{} exceeds order total ₹{}",
                input.advance_payment, totals.final_amount
            )));
        }

        let engineer = match input.engineer_id.as_deref() {
            Some(id) => {
                let staff = self.directory.find_active_by_id(&actor.company_id, id).await?;
                require_engineer(&staff)?;
                Some(staff)
            }
            None => None,
        };

        let initial = self.stages.find_initial().await?;
        let assigned_stage = match engineer {
            Some(_) => self.stages.find_by_slug(stage::ASSIGNED).await?,
            None => None,
        };

        let now = Utc::now();
        let key = numbering::order_counter_key(&actor.company_id, now);
        let sequence = self.store.next_sequence(&key).await?;

        let mut financials = Financials::default();
        apply_totals(&mut financials, &totals, input.discount);

        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            company_id: actor.company_id.clone(),
            order_number: numbering::format_order_number(now, sequence),
            order_type: OrderType::from_items(&items),
            customer: input.customer,
            device: input.device,
            problem_description: input.problem_description,
            items,
            tax_rate,
            is_inter_state: input.is_inter_state,
            priority: input.priority,
            assignment: engineer.as_ref().map(|e| Assignment {
                engineer_id: e.id.clone(),
                engineer_name: e.full_name.clone(),
                assigned_at: now,
            }),
            stage_id: String::new(),
            stage_name: String::new(),
            stage_slug: String::new(),
            stage_history: AppendLog::new(),
            financials,
            rollup: SubTaskRollup::default(),
            status: OrderStatus::Pending,
            internal_notes: AppendLog::new(),
            customer_notes: AppendLog::new(),
            invoice_id: None,
            invoice_number: None,
            expected_delivery: input.expected_delivery,
            created_by: actor.id.clone(),
            created_by_name: actor.name.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
            is_deleted: false,
            deleted_at: None,
        };

        let engineer_name = engineer.as_ref().map(|e| e.full_name.clone());
        push_stage(&mut order, &initial, actor, None, "Order created");
        if let (Some(assigned), Some(name)) = (&assigned_stage, &engineer_name) {
            push_stage(
                &mut order,
                assigned,
                actor,
                Some(name.clone()),
                &format!("Assigned to {}", name),
            );
        }

        Span::current().record("order_id", order.id.as_str());
        self.store.insert_order(&order).await?;
        record_stage_transition(&order.stage_slug, "creation");
        info!(order_number = %order.order_number, total = %order.financials.estimated_cost, "Order created");

        let invoice = self
            .ledger
            .generate_invoice(actor, InvoiceRequest::for_order(&order.id))
            .await?;

        if input.advance_payment > Decimal::ZERO {
            self.ledger
                .record_payment(
                    actor,
                    PaymentRequest {
                        invoice_id: invoice.id.clone(),
                        amount: input.advance_payment,
                        method: input.payment_method.unwrap_or(PaymentMethod::Cash),
                        payment_date: Some(now),
                        reference: None,
                        notes: Some("Advance payment".to_string()),
                    },
                )
                .await?;
        }

        self.log(
            ActivityLog::new(
                &order.company_id,
                &order.id,
                &order.order_number,
                ActivityType::OrderCreated,
                "Order Created",
                format!(
                    "Order {} created for {}",
                    order.order_number, order.customer.name
                ),
            )
            .by(&actor.id, &actor.name)
            .at_stage(&order.stage_id, &order.stage_name),
        );
        if let Some(name) = &engineer_name {
            self.log(
                ActivityLog::new(
                    &order.company_id,
                    &order.id,
                    &order.order_number,
                    ActivityType::OrderAssigned,
                    "Order Assigned",
                    format!("Order assigned to {}", name),
                )
                .by(&actor.id, &actor.name)
                .at_stage(&order.stage_id, &order.stage_name)
                .assigned_to(name),
            );
        }

        load_order(self.store.as_ref(), &actor.company_id, &order.id).await
    }

    /// Replace the billable items, recompute totals and refresh the invoice.
    #[instrument(skip(self, actor, update), fields(order_id = %order_id))]
    pub async fn update_order_items(
        &self,
        actor: &Actor,
        order_id: &str,
        update: OrderItemsUpdate,
    ) -> Result<Order, AppError> {
        let result: Result<Order, AppError> = async {
            update.validate()?;
            validate_items(&update.items)?;
            if let Some(rate) = update.tax_rate {
                validate_rate(rate)?;
            }

            let mut items = update.items.clone();
            refresh_item_amounts(&mut items);
            let items = &items;
            let update = &update;

            let (order, _) = self
                .modify_order("update_order_items", &actor.company_id, order_id, |order| {
                    let discount = update
                        .discount
                        .unwrap_or(order.financials.additional_discount);
                    let tax_rate = update.tax_rate.unwrap_or(order.tax_rate);
                    let is_inter_state = update.is_inter_state.unwrap_or(order.is_inter_state);
                    let totals = order_totals(items, discount, tax_rate, is_inter_state)?;

                    order.items = items.clone();
                    order.order_type = OrderType::from_items(items);
                    order.tax_rate = tax_rate;
                    order.is_inter_state = is_inter_state;
                    apply_totals(&mut order.financials, &totals, discount);
                    Ok(Some(()))
                })
                .await?;

            let invoice = self
                .ledger
                .generate_invoice(actor, InvoiceRequest::for_order(&order.id))
                .await?;

            self.log(
                ActivityLog::new(
                    &order.company_id,
                    &order.id,
                    &order.order_number,
                    ActivityType::OrderUpdated,
                    "Order Updated",
                    format!("Order items updated. New total: ₹{}", invoice.final_amount),
                )
                .by(&actor.id, &actor.name)
                .at_stage(&order.stage_id, &order.stage_name),
            );

            load_order(self.store.as_ref(), &actor.company_id, order_id).await
        }
        .await;
        record_operation("update_order_items", &result);
        result
    }

    /// Assign or reassign the order's engineer, moving a non-final order to `assigned`.
    #[instrument(skip(self, actor, notes), fields(order_id = %order_id, engineer_id = %engineer_id))]
    pub async fn assign_engineer(
        &self,
        actor: &Actor,
        order_id: &str,
        engineer_id: &str,
        notes: Option<String>,
    ) -> Result<Order, AppError> {
        let result: Result<Order, AppError> = async {
            let engineer = self
                .directory
                .find_active_by_id(&actor.company_id, engineer_id)
                .await?;
            require_engineer(&engineer)?;

            let all_stages = self.store.list_stages().await?;
            let assigned = self.stages.find_by_slug(stage::ASSIGNED).await?;
            let (engineer, assigned, notes) = (&engineer, &assigned, &notes);

            let (order, outcome) = self
                .modify_order("assign_engineer", &actor.company_id, order_id, |order| {
                    let previous = order.assignment.clone();
                    let same = previous
                        .as_ref()
                        .is_some_and(|a| a.engineer_id == engineer.id);
                    let current_is_final = all_stages
                        .iter()
                        .find(|s| s.id == order.stage_id)
                        .is_some_and(|s| s.is_final);

                    order.assignment = Some(Assignment {
                        engineer_id: engineer.id.clone(),
                        engineer_name: engineer.full_name.clone(),
                        assigned_at: Utc::now(),
                    });

                    let note = notes
                        .clone()
                        .unwrap_or_else(|| format!("Assigned to {}", engineer.full_name));
                    let target = assigned
                        .as_ref()
                        .filter(|s| !current_is_final && s.id != order.stage_id);
                    let moved = match target {
                        Some(stage) => {
                            push_stage(order, stage, actor, Some(engineer.full_name.clone()), &note);
                            true
                        }
                        None => {
                            if !same {
                                note_history(order, actor, Some(engineer.full_name.clone()), note);
                            }
                            false
                        }
                    };
                    // Re-assigning the current engineer is logged as a plain assignment.
                    let reassigned_from = previous.filter(|_| !same).map(|a| a.engineer_name);
                    Ok(Some((reassigned_from, moved)))
                })
                .await?;

            let (previous, moved) = outcome.unwrap_or((None, false));
            if moved {
                record_stage_transition(&order.stage_slug, "assignment");
            }

            let entry = match &previous {
                Some(prev) => ActivityLog::new(
                    &order.company_id,
                    &order.id,
                    &order.order_number,
                    ActivityType::OrderReassigned,
                    "Order Reassigned",
                    format!("Order reassigned from {} to {}", prev, engineer.full_name),
                )
                .change(Some(prev.clone()), Some(engineer.full_name.clone())),
                None => ActivityLog::new(
                    &order.company_id,
                    &order.id,
                    &order.order_number,
                    ActivityType::OrderAssigned,
                    "Order Assigned",
                    format!("Order assigned to {}", engineer.full_name),
                ),
            };
            self.log(
                entry
                    .by(&actor.id, &actor.name)
                    .at_stage(&order.stage_id, &order.stage_name)
                    .assigned_to(&engineer.full_name),
            );

            info!(engineer = %engineer.full_name, moved, "Engineer assigned");
            Ok(order)
        }
        .await;
        record_operation("assign_engineer", &result);
        result
    }

    /// Explicit stage change; bypasses sub-task classification.
    #[instrument(skip(self, actor, notes), fields(order_id = %order_id, stage_id = %stage_id))]
    pub async fn move_stage(
        &self,
        actor: &Actor,
        order_id: &str,
        stage_id: &str,
        notes: Option<String>,
    ) -> Result<Order, AppError> {
        let result: Result<Order, AppError> = async {
            let target = self
                .stages
                .find_by_id(stage_id)
                .await?
                .filter(|s| s.is_active)
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Stage {} not found", stage_id)))?;
            let (target_ref, notes) = (&target, &notes);

            let (order, from) = self
                .modify_order("move_stage", &actor.company_id, order_id, |order| {
                    if order.stage_id == target_ref.id {
                        return Ok(None);
                    }
                    let from = order.stage_name.clone();
                    let note = notes
                        .clone()
                        .unwrap_or_else(|| format!("Stage changed to {}", target_ref.name));
                    let assigned_to = order.engineer_name().map(str::to_string);
                    push_stage(order, target_ref, actor, assigned_to, &note);
                    Ok(Some(from))
                })
                .await?;

            if let Some(from) = from {
                record_stage_transition(&target.slug, "manual");
                self.log(
                    ActivityLog::new(
                        &order.company_id,
                        &order.id,
                        &order.order_number,
                        ActivityType::StageChanged,
                        "Stage Changed",
                        format!("Stage changed from \"{}\" to \"{}\"", from, target.name),
                    )
                    .by(&actor.id, &actor.name)
                    .at_stage(&order.stage_id, &order.stage_name)
                    .change(Some(from), Some(target.name.clone())),
                );
            }
            Ok(order)
        }
        .await;
        record_operation("move_stage", &result);
        result
    }

    #[instrument(skip(self, actor), fields(order_id = %order_id))]
    pub async fn update_order_status(
        &self,
        actor: &Actor,
        order_id: &str,
        status: &str,
    ) -> Result<Order, AppError> {
        let result: Result<Order, AppError> = async {
            let status: OrderStatus = status.parse().map_err(|e| AppError::BadRequest(anyhow::Error::new(e)))?;

            let (order, previous) = self
                .modify_order("update_order_status", &actor.company_id, order_id, |order| {
                    if order.status == status {
                        return Ok(None);
                    }
                    let previous = order.status;
                    order.status = status;
                    Ok(Some(previous))
                })
                .await?;

            if let Some(previous) = previous {
                self.log(
                    ActivityLog::new(
                        &order.company_id,
                        &order.id,
                        &order.order_number,
                        ActivityType::OrderUpdated,
                        "Order Status Updated",
                        format!(
                            "Order status changed from {} to {}",
                            previous.as_str(),
                            status.as_str()
                        ),
                    )
                    .by(&actor.id, &actor.name)
                    .change(
                        Some(previous.as_str().to_string()),
                        Some(status.as_str().to_string()),
                    ),
                );
            }
            Ok(order)
        }
        .await;
        record_operation("update_order_status", &result);
        result
    }

    /// Take a payment against the order.
    ///
    /// Goes through the ledger when the order has an invoice; otherwise the order's own
    /// advance and balance are adjusted directly.
    #[instrument(skip(self, actor, payment), fields(order_id = %order_id))]
    pub async fn add_payment(
        &self,
        actor: &Actor,
        order_id: &str,
        payment: OrderPayment,
    ) -> Result<Order, AppError> {
        let result: Result<Order, AppError> = async {
            if payment.amount <= Decimal::ZERO {
                return Err(bad_request("Payment amount must be greater than zero"));
            }
            let amount = payment.amount;
            let method = payment.method;
            let order = load_order(self.store.as_ref(), &actor.company_id, order_id).await?;
            let note = NoteEntry {
                note: format!("Payment received: ₹{} via {}", amount, method.as_str()),
                added_by: actor.id.clone(),
                added_by_name: actor.name.clone(),
                added_at: Utc::now(),
            };
            let note = &note;

            match self.store.find_invoice_for_order(&order.id).await? {
                Some(invoice) => {
                    self.ledger
                        .record_payment(
                            actor,
                            PaymentRequest {
                                invoice_id: invoice.id,
                                amount,
                                method,
                                payment_date: None,
                                reference: payment.reference.clone(),
                                notes: payment.notes.clone(),
                            },
                        )
                        .await?;
                    let (order, _) = self
                        .modify_order("add_payment_note", &actor.company_id, order_id, |order| {
                            order.internal_notes.append(note.clone());
                            Ok(Some(()))
                        })
                        .await?;
                    Ok(order)
                }
                None => {
                    let (order, _) = self
                        .modify_order("add_payment", &actor.company_id, order_id, |order| {
                            let f = &mut order.financials;
                            let balance = f.payable() - f.advance_payment;
                            if amount > balance {
                                return Err(AppError::PreconditionFailed(anyhow::anyhow!(
                                    "Payment amount ₹{} exceeds balance amount ₹{}",
                                    amount,
                                    balance
                                )));
                            }
                            f.advance_payment += amount;
                            refresh_balance(f);
                            order.internal_notes.append(note.clone());
                            Ok(Some(()))
                        })
                        .await?;

                    self.log(
                        ActivityLog::new(
                            &order.company_id,
                            &order.id,
                            &order.order_number,
                            ActivityType::PaymentAdded,
                            "Payment Added",
                            format!(
                                "Payment of ₹{} received via {}. Balance: ₹{}",
                                amount,
                                method.as_str(),
                                order.financials.balance_payment
                            ),
                        )
                        .by(&actor.id, &actor.name)
                        .with_metadata(serde_json::json!({
                            "amount": amount,
                            "method": method.as_str(),
                            "balance": order.financials.balance_payment,
                        })),
                    );
                    Ok(order)
                }
            }
        }
        .await;
        record_operation("add_payment", &result);
        result
    }

    #[instrument(skip(self, actor, note), fields(order_id = %order_id))]
    pub async fn add_note(
        &self,
        actor: &Actor,
        order_id: &str,
        note: &str,
        kind: NoteKind,
    ) -> Result<Order, AppError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(bad_request("Note cannot be empty"));
        }
        let entry = NoteEntry {
            note: note.to_string(),
            added_by: actor.id.clone(),
            added_by_name: actor.name.clone(),
            added_at: Utc::now(),
        };
        let entry = &entry;

        let (order, _) = self
            .modify_order("add_note", &actor.company_id, order_id, |order| {
                match kind {
                    NoteKind::Internal => order.internal_notes.append(entry.clone()),
                    NoteKind::Customer => order.customer_notes.append(entry.clone()),
                }
                Ok(Some(()))
            })
            .await?;

        let label = match kind {
            NoteKind::Internal => "Internal",
            NoteKind::Customer => "Customer",
        };
        self.log(
            ActivityLog::new(
                &order.company_id,
                &order.id,
                &order.order_number,
                ActivityType::NoteAdded,
                "Note Added",
                format!("{} note added: {}", label, note),
            )
            .by(&actor.id, &actor.name),
        );
        Ok(order)
    }

    /// Soft-delete the order with its sub-tasks and activity. Ledger documents stay.
    #[instrument(skip(self, actor), fields(order_id = %order_id))]
    pub async fn soft_delete_order(&self, actor: &Actor, order_id: &str) -> Result<(), AppError> {
        let result: Result<(), AppError> = async {
            let now = Utc::now();
            self.modify_order("soft_delete_order", &actor.company_id, order_id, |order| {
                order.is_deleted = true;
                order.deleted_at = Some(now);
                Ok(Some(()))
            })
            .await?;

            let sub_tasks = self
                .store
                .soft_delete_sub_tasks_for_order(order_id, now)
                .await?;
            let activity = self.store.soft_delete_activity_for_order(order_id).await?;
            info!(sub_tasks, activity, "Order soft-deleted");
            Ok(())
        }
        .await;
        record_operation("soft_delete_order", &result);
        result
    }

    pub async fn get_order(&self, actor: &Actor, order_id: &str) -> Result<Order, AppError> {
        load_order(self.store.as_ref(), &actor.company_id, order_id).await
    }

    pub async fn list_activity(
        &self,
        actor: &Actor,
        order_id: &str,
    ) -> Result<Vec<ActivityLog>, AppError> {
        load_order(self.store.as_ref(), &actor.company_id, order_id).await?;
        self.store.list_activity(order_id).await
    }

    /// Sub-tasks and orders assigned to an engineer, most recently touched first.
    pub async fn work_items(
        &self,
        actor: &Actor,
        engineer_id: &str,
    ) -> Result<Vec<WorkItem>, AppError> {
        let tasks = self
            .store
            .list_sub_tasks_assigned_to(&actor.company_id, engineer_id)
            .await?;
        let orders = self
            .store
            .list_orders_assigned_to(&actor.company_id, engineer_id)
            .await?;

        let mut items: Vec<WorkItem> = tasks
            .iter()
            .map(|t| WorkItem::SubTask(t.into()))
            .chain(orders.iter().map(|o| WorkItem::Order(o.into())))
            .collect();
        items.sort_by_key(|item| std::cmp::Reverse(item.updated_at()));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceItem;
    use rust_decimal_macros::dec;

    fn service(quantity: i32, price: Decimal) -> LineItem {
        LineItem::Service(ServiceItem {
            service_id: None,
            name: "Diagnostics".into(),
            description: None,
            quantity,
            unit_price: price,
            actual_cost: None,
            discount: Decimal::ZERO,
            tax_rate: dec!(18),
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        })
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(validate_items(&[service(0, dec!(100))]).is_err());
        assert!(validate_items(&[service(1, dec!(100))]).is_ok());
    }

    #[test]
    fn discount_beyond_subtotal_is_rejected() {
        let err = order_totals(&[service(1, dec!(100))], dec!(150), dec!(18), false).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn balance_follows_final_cost_when_invoiced() {
        let mut financials = Financials {
            estimated_cost: dec!(1000),
            advance_payment: dec!(400),
            ..Default::default()
        };
        refresh_balance(&mut financials);
        assert_eq!(financials.balance_payment, dec!(600));
        assert_eq!(financials.payment_status, crate::models::PaymentStatus::Partial);

        financials.final_cost = Some(dec!(400));
        refresh_balance(&mut financials);
        assert_eq!(financials.balance_payment, dec!(0));
        assert_eq!(financials.payment_status, crate::models::PaymentStatus::Paid);
    }
}
