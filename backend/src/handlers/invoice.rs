//! HTTP handlers for invoices

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Invoice, InvoiceWithItems, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::invoice::{
    CreateInvoiceInput, InvoiceFilter, InvoiceService, UpdateInvoiceInput,
};
use crate::AppState;

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(input): Json<CreateInvoiceInput>,
) -> AppResult<(StatusCode, Json<InvoiceWithItems>)> {
    let service = InvoiceService::new(state.db);
    let invoice = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<Invoice>>> {
    let service = InvoiceService::new(state.db);
    let invoices = service.list(&filter, &pagination).await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<InvoiceWithItems>> {
    let service = InvoiceService::new(state.db);
    let invoice = service.get(invoice_id).await?;
    Ok(Json(invoice))
}

/// Update status, header fields or lines
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<UpdateInvoiceInput>,
) -> AppResult<Json<InvoiceWithItems>> {
    let service = InvoiceService::new(state.db);
    let invoice = service.update(invoice_id, input).await?;
    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = InvoiceService::new(state.db);
    service.delete(invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
