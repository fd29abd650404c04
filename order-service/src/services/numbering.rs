//! Document numbers and Indian fiscal-period tagging.

use chrono::{DateTime, Datelike, Utc};

use crate::models::Quarter;

/// Counter key for order numbers: one sequence per company and calendar year.
pub fn order_counter_key(company_id: &str, at: DateTime<Utc>) -> String {
    format!("order:{}:{}", company_id, at.year())
}

/// `ORD-2026-00042`
pub fn format_order_number(at: DateTime<Utc>, sequence: i64) -> String {
    format!("ORD-{}-{:05}", at.year(), sequence)
}

/// Counter key for invoice numbers: one sequence per company and calendar month.
pub fn invoice_counter_key(company_id: &str, at: DateTime<Utc>) -> String {
    format!("invoice:{}:{}{:02}", company_id, at.year(), at.month())
}

/// `INV26100007` for the seventh invoice of October 2026.
pub fn format_invoice_number(at: DateTime<Utc>, sequence: i64) -> String {
    format!("INV{:02}{:02}{:04}", at.year() % 100, at.month(), sequence)
}

pub fn payment_counter_key(company_id: &str, at: DateTime<Utc>) -> String {
    format!("payment:{}:{}", company_id, at.year())
}

/// `PAY-2026-00003`
pub fn format_payment_number(at: DateTime<Utc>, sequence: i64) -> String {
    format!("PAY-{}-{:05}", at.year(), sequence)
}

pub fn sale_number(invoice_number: &str) -> String {
    format!("SALE-{}", invoice_number)
}

/// Financial year label; the year starts in April (`2026-27` for Oct 2026).
pub fn financial_year(at: DateTime<Utc>) -> String {
    let year = at.year();
    let start = if at.month() >= 4 { year } else { year - 1 };
    format!("{}-{:02}", start, (start + 1) % 100)
}

pub fn quarter(month: u32) -> Quarter {
    match month {
        4..=6 => Quarter::Q1,
        7..=9 => Quarter::Q2,
        10..=12 => Quarter::Q3,
        _ => Quarter::Q4,
    }
}
