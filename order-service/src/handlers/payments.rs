use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::models::{Actor, Invoice, Payment, PaymentMethod};
use crate::services::PaymentRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub invoice_id: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payment_date: Option<DateTime<Utc>>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl From<RecordPaymentRequest> for PaymentRequest {
    fn from(req: RecordPaymentRequest) -> Self {
        Self {
            invoice_id: req.invoice_id,
            amount: req.amount,
            method: req.method,
            payment_date: req.payment_date,
            reference: req.reference,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub payment: Payment,
    pub invoice: Invoice,
}

/// POST /payments
pub async fn record_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordPaymentResponse>), AppError> {
    let (payment, invoice) = state.ledger.record_payment(&actor, req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(RecordPaymentResponse { payment, invoice }),
    ))
}

/// DELETE /payments/:id
///
/// Returns the invoice with the payment's amount taken back out.
pub async fn delete_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.ledger.delete_payment(&actor, &id).await?))
}

/// GET /orders/:id/ledger-payments
pub async fn list_order_payments(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(
        state.ledger.list_payments_for_order(&actor, &order_id).await?,
    ))
}
