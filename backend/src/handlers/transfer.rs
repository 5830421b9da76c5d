//! HTTP handlers for manufacturing transfers and completion

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{ManufacturingRun, Pagination, ProductTransfer, RawMaterialConsumption};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::manufacturing::{
    CompleteManufacturingInput, CompletionResult, ManufacturingService,
};
use crate::services::transfer::{
    CreateTransferInput, ResolveTransferInput, TransferFilter, TransferService,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub product_id: Option<Uuid>,
}

/// Submit finished goods, consuming materials from the user's inventory
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<(StatusCode, Json<ProductTransfer>)> {
    let service = TransferService::new(state.db);
    let transfer = service.create_transfer(input).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// Receive, reject or cancel a transfer
pub async fn resolve_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<ResolveTransferInput>,
) -> AppResult<Json<ProductTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service.resolve_transfer(transfer_id, input).await?;
    Ok(Json(transfer))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<ProductTransfer>> {
    let service = TransferService::new(state.db);
    let transfer = service.get(transfer_id).await?;
    Ok(Json(transfer))
}

pub async fn list_transfers(
    State(state): State<AppState>,
    Query(filter): Query<TransferFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<ProductTransfer>>> {
    let service = TransferService::new(state.db);
    let transfers = service.list(&filter, &pagination).await?;
    Ok(Json(transfers))
}

pub async fn get_transfer_consumptions(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<Vec<RawMaterialConsumption>>> {
    let service = TransferService::new(state.db);
    let rows = service.consumptions(transfer_id).await?;
    Ok(Json(rows))
}

/// Turn issued batches into finished goods
pub async fn complete_manufacturing(
    State(state): State<AppState>,
    Json(input): Json<CompleteManufacturingInput>,
) -> AppResult<(StatusCode, Json<CompletionResult>)> {
    let service = ManufacturingService::new(state.db);
    let result = service.complete(input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn list_manufacturing_runs(
    State(state): State<AppState>,
    Query(query): Query<RunQuery>,
) -> AppResult<Json<Vec<ManufacturingRun>>> {
    let service = ManufacturingService::new(state.db);
    let runs = service.list_runs(query.product_id).await?;
    Ok(Json(runs))
}
