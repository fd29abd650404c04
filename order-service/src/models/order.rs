//! Order aggregate: the unit of consistency for the lifecycle engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::append_log::AppendLog;
use super::InvalidVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Service,
    Product,
    Mixed,
}

impl OrderType {
    /// Derive the order type from the mix of billable items.
    pub fn from_items(items: &[LineItem]) -> Self {
        let services = items.iter().any(|i| matches!(i, LineItem::Service(_)));
        let products = items.iter().any(|i| matches!(i, LineItem::Product(_)));
        match (services, products) {
            (true, true) => OrderType::Mixed,
            (false, true) => OrderType::Product,
            _ => OrderType::Service,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Returned,
    Reopened,
}

impl OrderStatus {
    pub const ALL: &'static str = "pending, in_progress, completed, cancelled, returned, reopened";

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
            OrderStatus::Reopened => "reopened",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = InvalidVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            "reopened" => Ok(OrderStatus::Reopened),
            other => Err(InvalidVariant::new("order status", other, Self::ALL)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Payment classification shared by orders, invoices and sale records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub customer_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gstin: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub service_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Cost recorded after the work is done; replaces `unit_price` for billing.
    pub actual_cost: Option<Decimal>,
    #[serde(default)]
    pub discount: Decimal,
    pub tax_rate: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub product_id: Option<String>,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub tax_rate: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub total_amount: Decimal,
}

/// A billable line on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    Service(ServiceItem),
    Product(ProductItem),
}

impl LineItem {
    pub fn name(&self) -> &str {
        match self {
            LineItem::Service(s) => &s.name,
            LineItem::Product(p) => &p.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LineItem::Service(_) => "service",
            LineItem::Product(_) => "product",
        }
    }

    pub fn quantity(&self) -> i32 {
        match self {
            LineItem::Service(s) => s.quantity,
            LineItem::Product(p) => p.quantity,
        }
    }

    /// Unit price used for billing.
    pub fn billable_unit_price(&self) -> Decimal {
        match self {
            LineItem::Service(s) => s.actual_cost.unwrap_or(s.unit_price),
            LineItem::Product(p) => p.unit_price,
        }
    }

    pub fn discount(&self) -> Decimal {
        match self {
            LineItem::Service(s) => s.discount,
            LineItem::Product(p) => p.discount,
        }
    }

    pub fn tax_rate(&self) -> Decimal {
        match self {
            LineItem::Service(s) => s.tax_rate,
            LineItem::Product(p) => p.tax_rate,
        }
    }

    pub fn set_amounts(&mut self, tax_amount: Decimal, total_amount: Decimal) {
        match self {
            LineItem::Service(s) => {
                s.tax_amount = tax_amount;
                s.total_amount = total_amount;
            }
            LineItem::Product(p) => {
                p.tax_amount = tax_amount;
                p.total_amount = total_amount;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub engineer_id: String,
    pub engineer_name: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    pub stage_id: String,
    pub stage_name: String,
    pub stage_slug: String,
    pub changed_by: String,
    pub changed_by_name: String,
    pub assigned_to: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub note: String,
    pub added_by: String,
    pub added_by_name: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Internal,
    Customer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub subtotal: Decimal,
    /// Order-level discount on top of the per-item discounts.
    pub additional_discount: Decimal,
    pub discount: Decimal,
    pub taxable_amount: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total_tax: Decimal,
    pub total_amount: Decimal,
    pub round_off: Decimal,
    pub estimated_cost: Decimal,
    /// Set from the invoice once one exists.
    pub final_cost: Option<Decimal>,
    pub advance_payment: Decimal,
    pub balance_payment: Decimal,
    pub payment_status: PaymentStatus,
}

impl Financials {
    /// The amount the customer owes in total.
    pub fn payable(&self) -> Decimal {
        self.final_cost.unwrap_or(self.estimated_cost)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskRollup {
    pub has_sub_tasks: bool,
    pub total_sub_tasks: i32,
    pub completed_sub_tasks: i32,
    pub sub_task_progress: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub company_id: String,
    pub order_number: String,
    pub order_type: OrderType,
    pub customer: CustomerSnapshot,
    pub device: Option<serde_json::Value>,
    pub problem_description: Option<String>,
    pub items: Vec<LineItem>,
    pub tax_rate: Decimal,
    pub is_inter_state: bool,
    pub priority: Priority,
    pub assignment: Option<Assignment>,
    pub stage_id: String,
    pub stage_name: String,
    pub stage_slug: String,
    pub stage_history: AppendLog<StageHistoryEntry>,
    pub financials: Financials,
    pub rollup: SubTaskRollup,
    pub status: OrderStatus,
    pub internal_notes: AppendLog<NoteEntry>,
    pub customer_notes: AppendLog<NoteEntry>,
    pub invoice_id: Option<String>,
    pub invoice_number: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every successful conditional write.
    pub version: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn engineer_id(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.engineer_id.as_str())
    }

    pub fn engineer_name(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.engineer_name.as_str())
    }

    pub fn has_services(&self) -> bool {
        self.items.iter().any(|i| matches!(i, LineItem::Service(_)))
    }

    pub fn has_products(&self) -> bool {
        self.items.iter().any(|i| matches!(i, LineItem::Product(_)))
    }
}
