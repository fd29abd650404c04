//! Tax and totals calculator.
//!
//! Pure functions over `Decimal`; nothing here touches storage. Every place that derives
//! a payment status goes through [`classify_payment`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::{LineItem, PaymentStatus};

/// The billing inputs of one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillLine {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub tax_rate: Decimal,
}

impl BillLine {
    pub fn gross(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

impl From<&LineItem> for BillLine {
    fn from(item: &LineItem) -> Self {
        Self {
            quantity: Decimal::from(item.quantity()),
            unit_price: item.billable_unit_price(),
            discount: item.discount(),
            tax_rate: item.tax_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
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
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemAmounts {
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round to the nearest whole currency unit, halves away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Order/invoice totals. Tax is charged at `tax_rate` on the discounted amount, split
/// evenly into CGST and SGST unless the supply is inter-state.
pub fn compute_totals(
    items: &[BillLine],
    additional_discount: Decimal,
    tax_rate: Decimal,
    is_inter_state: bool,
) -> Totals {
    let subtotal: Decimal = items.iter().map(BillLine::gross).sum();
    let discount: Decimal =
        items.iter().map(|i| i.discount).sum::<Decimal>() + additional_discount;
    let taxable_amount = subtotal - discount;

    let (cgst, sgst, igst) = if is_inter_state {
        (Decimal::ZERO, Decimal::ZERO, taxable_amount * tax_rate / HUNDRED)
    } else {
        let half = taxable_amount * (tax_rate / Decimal::TWO) / HUNDRED;
        (half, half, Decimal::ZERO)
    };

    let total_tax = cgst + sgst + igst;
    let total_amount = taxable_amount + total_tax;
    let final_amount = round_currency(total_amount);

    Totals {
        subtotal,
        discount,
        taxable_amount,
        cgst,
        sgst,
        igst,
        total_tax,
        total_amount,
        round_off: final_amount - total_amount,
        final_amount,
    }
}

/// Per-line amounts with the same discount-then-tax order as [`compute_totals`].
pub fn compute_item_amounts(
    quantity: Decimal,
    unit_price: Decimal,
    discount: Decimal,
    tax_rate: Decimal,
) -> ItemAmounts {
    let taxable_amount = quantity * unit_price - discount;
    let tax_amount = taxable_amount * tax_rate / HUNDRED;
    ItemAmounts {
        taxable_amount,
        tax_amount,
        total_amount: taxable_amount + tax_amount,
    }
}

/// Split a fixed discount across lines in proportion to each line's unit price.
///
/// Shares are rounded to paise; the last line absorbs the rounding remainder so the
/// shares always sum to `discount`.
pub fn distribute_discount(unit_prices: &[Decimal], discount: Decimal) -> Vec<Decimal> {
    let total: Decimal = unit_prices.iter().copied().sum();
    if unit_prices.is_empty() || total.is_zero() {
        return vec![Decimal::ZERO; unit_prices.len()];
    }

    let mut shares: Vec<Decimal> = unit_prices
        .iter()
        .map(|price| (*price * discount / total).round_dp(2))
        .collect();

    let allotted: Decimal = shares.iter().copied().sum();
    if let Some(last) = shares.last_mut() {
        *last += discount - allotted;
    }
    shares
}

pub fn classify_payment(paid_amount: Decimal, final_amount: Decimal) -> PaymentStatus {
    if paid_amount >= final_amount {
        PaymentStatus::Paid
    } else if paid_amount.is_zero() {
        PaymentStatus::Unpaid
    } else {
        PaymentStatus::Partial
    }
}

/// `round(completed / total * 100)`, or 0 without sub-tasks.
pub fn progress_percent(completed: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let ratio = Decimal::from(completed) * HUNDRED / Decimal::from(total);
    round_currency(ratio).try_into().unwrap_or(0)
}

/// Recompute the stored per-item tax and total fields of an order's items.
pub fn refresh_item_amounts(items: &mut [LineItem]) {
    for item in items.iter_mut() {
        let line = BillLine::from(&*item);
        let amounts =
            compute_item_amounts(line.quantity, line.unit_price, line.discount, line.tax_rate);
        item.set_amounts(amounts.tax_amount, amounts.total_amount);
    }
}
