//! HTTP handlers for document sequences

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{DocumentKind, FinancialYear};

use crate::error::{AppError, AppResult};
use crate::services::sequence::{IssuedNumber, SequenceService, SequenceStatus, SyncOutcome};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SequenceQuery {
    /// `2024-2025` form; defaults to the current financial year
    pub financial_year: Option<String>,
}

fn parse_target(domain: &str, query: &SequenceQuery) -> AppResult<(DocumentKind, FinancialYear)> {
    let kind = DocumentKind::from_str(domain).ok_or_else(|| AppError::Validation {
        field: "domain".to_string(),
        message: format!("Unknown sequence domain: {}", domain),
    })?;

    let year = match query.financial_year.as_deref() {
        Some(raw) => FinancialYear::parse(raw).ok_or_else(|| AppError::Validation {
            field: "financial_year".to_string(),
            message: format!("Financial year must look like 2024-2025, got {}", raw),
        })?,
        None => FinancialYear::current(),
    };

    Ok((kind, year))
}

/// Counter state and the number the next document would get
pub async fn get_sequence(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<SequenceQuery>,
) -> AppResult<Json<SequenceStatus>> {
    let (kind, year) = parse_target(&domain, &query)?;
    let service = SequenceService::new(state.db);
    let status = service.status(kind, year).await?;
    Ok(Json(status))
}

/// Issue a number outside a document insert
pub async fn next_number(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<SequenceQuery>,
) -> AppResult<Json<IssuedNumber>> {
    let (kind, year) = parse_target(&domain, &query)?;
    let service = SequenceService::new(state.db);
    let issued = service.next_number(kind, year).await?;
    Ok(Json(issued))
}

/// Reconcile the counter with stored documents
pub async fn sync_sequence(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(query): Query<SequenceQuery>,
) -> AppResult<Json<SyncOutcome>> {
    let (kind, year) = parse_target(&domain, &query)?;
    let service = SequenceService::new(state.db);
    let outcome = service.sync(kind, year).await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_accepts_known_domain_and_year() {
        let query = SequenceQuery {
            financial_year: Some("2024-2025".to_string()),
        };
        let (kind, year) = parse_target("vendor_payment", &query).unwrap();
        assert_eq!(kind, DocumentKind::VendorPayment);
        assert_eq!(year, FinancialYear::starting(2024));
    }

    #[test]
    fn test_parse_target_rejects_bad_input() {
        let query = SequenceQuery::default();
        assert!(matches!(
            parse_target("invoice", &query),
            Err(AppError::Validation { .. })
        ));

        let query = SequenceQuery {
            financial_year: Some("2024-26".to_string()),
        };
        assert!(matches!(
            parse_target("bill", &query),
            Err(AppError::Validation { .. })
        ));
    }
}
