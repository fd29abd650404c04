use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::{Actor, Invoice, TaxType};
use crate::services::InvoiceRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub order_id: String,
    pub gst_rate: Option<Decimal>,
    pub tax_type: Option<TaxType>,
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
}

impl From<GenerateInvoiceRequest> for InvoiceRequest {
    fn from(req: GenerateInvoiceRequest) -> Self {
        Self {
            order_id: req.order_id,
            gst_rate: req.gst_rate,
            tax_type: req.tax_type,
            discount: req.discount,
            notes: req.notes,
        }
    }
}

/// POST /invoices
pub async fn generate_invoice(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let invoice = state.ledger.generate_invoice(&actor, req.into()).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.ledger.get_invoice(&actor, &id).await?))
}

/// POST /invoices/:id/reconcile
pub async fn reconcile_invoice(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.ledger.reconcile_invoice(&actor, &id).await?))
}

/// GET /orders/:id/invoices
pub async fn list_order_invoices(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(
        state.ledger.list_invoices_for_order(&actor, &order_id).await?,
    ))
}
