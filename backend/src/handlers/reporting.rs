//! Reporting handlers for the consumption audit log

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::reporting::{ConsumptionFilter, ReportingService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub user_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

impl ReportQuery {
    fn filter(&self) -> ConsumptionFilter {
        ConsumptionFilter {
            user_id: self.user_id,
            product_id: self.product_id,
            start_date: self.start_date.as_deref().and_then(|s| s.parse().ok()),
            end_date: self.end_date.as_deref().and_then(|s| s.parse().ok()),
        }
    }

    fn wants_csv(&self) -> bool {
        self.format.as_deref() == Some("csv")
    }
}

fn respond<T: Serialize>(data: Vec<T>, as_csv: bool, filename: &str) -> AppResult<Response> {
    if as_csv {
        let csv = ReportingService::export_to_csv(&data)?;
        let disposition = format!("attachment; filename=\"{}\"", filename);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(data).into_response())
    }
}

/// Consumption audit log
pub async fn get_consumption_log(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.db);
    let rows = service.consumption_log(&query.filter()).await?;
    respond(rows, query.wants_csv(), "consumption_log.csv")
}

/// Material totals over the consumption log
pub async fn get_material_usage(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.db);
    let rows = service.material_usage(&query.filter()).await?;
    respond(rows, query.wants_csv(), "material_usage.csv")
}
