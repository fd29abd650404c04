//! Period-tagged reporting snapshot of an invoice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::invoice::TaxType;
use super::order::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    Service,
    Product,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Keyed by the invoice id so the record is upserted, never duplicated.
    #[serde(rename = "_id")]
    pub invoice_id: String,
    pub company_id: String,
    pub sale_number: String,
    pub sale_date: DateTime<Utc>,
    pub financial_year: String,
    pub month: u32,
    pub quarter: Quarter,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_gstin: Option<String>,
    pub customer_state: Option<String>,
    pub invoice_number: String,
    pub order_id: String,
    pub order_number: String,
    pub items_value: Decimal,
    pub discount: Decimal,
    pub taxable_value: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total_gst: Decimal,
    pub total_amount: Decimal,
    pub round_off: Decimal,
    pub final_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub gst_rate: Decimal,
    pub tax_type: TaxType,
    pub sale_type: SaleType,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
}
