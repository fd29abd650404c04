//! Invoice document; the transaction boundary for payment propagation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::order::{CustomerSnapshot, PaymentStatus};
use super::InvalidVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    #[default]
    Intrastate,
    Interstate,
}

impl TaxType {
    pub fn from_inter_state(is_inter_state: bool) -> Self {
        if is_inter_state {
            TaxType::Interstate
        } else {
            TaxType::Intrastate
        }
    }

    pub fn is_inter_state(&self) -> bool {
        matches!(self, TaxType::Interstate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxType::Intrastate => "intrastate",
            TaxType::Interstate => "interstate",
        }
    }
}

impl FromStr for TaxType {
    type Err = InvalidVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intrastate" => Ok(TaxType::Intrastate),
            "interstate" => Ok(TaxType::Interstate),
            other => Err(InvalidVariant::new(
                "tax type",
                other,
                "intrastate, interstate",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub item_kind: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub company_id: String,
    pub invoice_number: String,
    pub order_id: String,
    pub order_number: String,
    pub customer: CustomerSnapshot,
    pub items: Vec<InvoiceItem>,
    pub gst_rate: Decimal,
    pub tax_type: TaxType,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub taxable_amount: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub total_tax: Decimal,
    pub total_amount: Decimal,
    pub round_off: Decimal,
    pub final_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_amount: Decimal,
    pub payment_status: PaymentStatus,
    /// Payments whose amount is already included in `paid_amount`.
    pub applied_payment_ids: Vec<String>,
    pub invoice_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub is_deleted: bool,
}

impl Invoice {
    pub fn has_applied(&self, payment_id: &str) -> bool {
        self.applied_payment_ids.iter().any(|id| id == payment_id)
    }
}
