//! HTTP handlers for raw material issuance and the repair workflow

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Pagination, RawMaterialTransfer, UserInventory};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::issuance::{IssuanceFilter, IssuanceService, IssueBatchInput, StatusNoteInput};
use crate::AppState;

/// Issue a batch of raw materials to a user
pub async fn issue_batch(
    State(state): State<AppState>,
    Json(input): Json<IssueBatchInput>,
) -> AppResult<(StatusCode, Json<Vec<RawMaterialTransfer>>)> {
    let service = IssuanceService::new(state.db);
    let transfers = service.issue_batch(input).await?;
    Ok((StatusCode::CREATED, Json(transfers)))
}

pub async fn list_issuances(
    State(state): State<AppState>,
    Query(filter): Query<IssuanceFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<RawMaterialTransfer>>> {
    let service = IssuanceService::new(state.db);
    let transfers = service.list(&filter, &pagination).await?;
    Ok(Json(transfers))
}

pub async fn get_issuance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RawMaterialTransfer>> {
    let service = IssuanceService::new(state.db);
    let transfer = service.get(id).await?;
    Ok(Json(transfer))
}

pub async fn mark_returned(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    input: Option<Json<StatusNoteInput>>,
) -> AppResult<Json<RawMaterialTransfer>> {
    let service = IssuanceService::new(state.db);
    let transfer = service
        .mark_returned(id, input.map(|Json(i)| i).unwrap_or_default())
        .await?;
    Ok(Json(transfer))
}

pub async fn mark_repairing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    input: Option<Json<StatusNoteInput>>,
) -> AppResult<Json<RawMaterialTransfer>> {
    let service = IssuanceService::new(state.db);
    let transfer = service
        .mark_repairing(id, input.map(|Json(i)| i).unwrap_or_default())
        .await?;
    Ok(Json(transfer))
}

pub async fn mark_finished(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    input: Option<Json<StatusNoteInput>>,
) -> AppResult<Json<RawMaterialTransfer>> {
    let service = IssuanceService::new(state.db);
    let transfer = service
        .mark_finished(id, input.map(|Json(i)| i).unwrap_or_default())
        .await?;
    Ok(Json(transfer))
}

/// A user's raw material balances
pub async fn get_user_inventory(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<UserInventory>>> {
    let service = IssuanceService::new(state.db);
    let inventory = service.user_inventory(user_id).await?;
    Ok(Json(inventory))
}
