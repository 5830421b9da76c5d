//! HTTP handlers for receipts and vendor documents

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Pagination, Receipt, VendorCreditNote, VendorPayment};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::documents::{
    DocumentService, RecordReceiptInput, RecordVendorCreditNoteInput, RecordVendorPaymentInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    pub invoice_id: Option<Uuid>,
}

pub async fn record_receipt(
    State(state): State<AppState>,
    Json(input): Json<RecordReceiptInput>,
) -> AppResult<(StatusCode, Json<Receipt>)> {
    let service = DocumentService::new(state.db);
    let receipt = service.record_receipt(input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<Receipt>>> {
    let service = DocumentService::new(state.db);
    let receipts = service.list_receipts(query.invoice_id, &pagination).await?;
    Ok(Json(receipts))
}

pub async fn record_vendor_payment(
    State(state): State<AppState>,
    Json(input): Json<RecordVendorPaymentInput>,
) -> AppResult<(StatusCode, Json<VendorPayment>)> {
    let service = DocumentService::new(state.db);
    let payment = service.record_vendor_payment(input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list_vendor_payments(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<VendorPayment>>> {
    let service = DocumentService::new(state.db);
    let payments = service.list_vendor_payments(&pagination).await?;
    Ok(Json(payments))
}

pub async fn record_vendor_credit_note(
    State(state): State<AppState>,
    Json(input): Json<RecordVendorCreditNoteInput>,
) -> AppResult<(StatusCode, Json<VendorCreditNote>)> {
    let service = DocumentService::new(state.db);
    let note = service.record_vendor_credit_note(input).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn list_vendor_credit_notes(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<VendorCreditNote>>> {
    let service = DocumentService::new(state.db);
    let notes = service.list_vendor_credit_notes(&pagination).await?;
    Ok(Json(notes))
}
