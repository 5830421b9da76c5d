//! Raw material issuance from central stock to users, and the status-only
//! repair workflow on issued batches

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    plan_withdrawals, validate_quantity, Demand, Pagination, RawMaterialTransfer, RawMaterialTransferStatus,
    UserInventory,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{check_field, ledger};
use crate::error::{AppError, AppResult};

/// Service for issuing raw materials and tracking issued batches
#[derive(Clone)]
pub struct IssuanceService {
    db: PgPool,
}

/// One material in an issuance batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueItem {
    pub raw_material_id: Uuid,
    pub quantity_issued: Decimal,
}

/// Input for issuing a batch of raw materials to one user
#[derive(Debug, Deserialize, Validate)]
pub struct IssueBatchInput {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<IssueItem>,
    pub notes: Option<String>,
}

/// Input for a repair workflow status change
#[derive(Debug, Default, Deserialize)]
pub struct StatusNoteInput {
    pub notes: Option<String>,
}

/// Filter for listing issuance batches
#[derive(Debug, Default, Deserialize)]
pub struct IssuanceFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<RawMaterialTransferStatus>,
}

pub(crate) const TRANSFER_SELECT: &str = r#"
    SELECT t.id, t.user_id, u.name AS user_name, t.raw_material_id,
           rm.name AS raw_material_name, rm.unit, t.quantity_issued, t.status,
           t.notes, t.manufacturing_run_id, t.created_at, t.updated_at
    FROM raw_material_transfers t
    JOIN raw_materials rm ON rm.id = t.raw_material_id
    LEFT JOIN users u ON u.id = t.user_id
"#;

impl IssuanceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Move raw materials from central stock into a user's inventory.
    ///
    /// The whole batch commits or nothing does; the first shortfall aborts it.
    pub async fn issue_batch(&self, input: IssueBatchInput) -> AppResult<Vec<RawMaterialTransfer>> {
        let demands = batch_demands(&input)?;
        let material_ids: Vec<Uuid> = demands.iter().map(|d| d.id).collect();

        // Fail fast without taking locks
        {
            let levels = sqlx::query_as::<_, shared::StockLevel>(
                "SELECT id, name, quantity AS available FROM raw_materials WHERE id = ANY($1)",
            )
            .bind(&material_ids)
            .fetch_all(&self.db)
            .await?;
            if let Err(err) = plan_withdrawals(&demands, &levels, "Raw material") {
                tracing::warn!(user_id = %input.user_id, error = %err, "Issuance rejected");
                return Err(err.into());
            }
        }

        let mut tx = self.db.begin().await?;
        ledger::ensure_user(&mut *tx, input.user_id).await?;

        // Stock may have moved since the pre-check
        let levels = ledger::lock_raw_materials(&mut *tx, &material_ids).await?;
        if let Err(err) = plan_withdrawals(&demands, &levels, "Raw material") {
            tracing::warn!(user_id = %input.user_id, error = %err, "Issuance rejected under lock");
            return Err(err.into());
        }

        let mut transfer_ids = Vec::with_capacity(input.items.len());
        for item in &input.items {
            ledger::debit_raw_material(&mut *tx, item.raw_material_id, item.quantity_issued).await?;

            let id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO raw_material_transfers (user_id, raw_material_id, quantity_issued, status, notes)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(input.user_id)
            .bind(item.raw_material_id)
            .bind(item.quantity_issued)
            .bind(RawMaterialTransferStatus::Sent)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

            ledger::credit_user_inventory(&mut *tx, input.user_id, item.raw_material_id, item.quantity_issued)
                .await?;
            transfer_ids.push(id);
        }

        let transfers = fetch_transfers(&mut *tx, &transfer_ids).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %input.user_id,
            batches = transfers.len(),
            "Raw materials issued"
        );
        Ok(transfers)
    }

    /// List issuance batches, newest first
    pub async fn list(
        &self,
        filter: &IssuanceFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<RawMaterialTransfer>> {
        let query = format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR t.user_id = $1)
              AND ($2::varchar IS NULL OR t.status = $2)
            ORDER BY t.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            TRANSFER_SELECT
        );

        let transfers = sqlx::query_as::<_, RawMaterialTransfer>(&query)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(transfers)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<RawMaterialTransfer> {
        let mut conn = self.db.acquire().await?;
        fetch_transfers(&mut *conn, &[id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Raw material transfer".to_string()))
    }

    /// A user's personal raw material balances
    pub async fn user_inventory(&self, user_id: Uuid) -> AppResult<Vec<UserInventory>> {
        let rows = sqlx::query_as::<_, UserInventory>(
            r#"
            SELECT ui.id, ui.user_id, ui.raw_material_id, rm.name AS raw_material_name,
                   ui.quantity, ui.unit, ui.updated_at
            FROM user_inventories ui
            JOIN raw_materials rm ON rm.id = ui.raw_material_id
            WHERE ui.user_id = $1
            ORDER BY rm.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    pub async fn mark_returned(&self, id: Uuid, input: StatusNoteInput) -> AppResult<RawMaterialTransfer> {
        self.transition(id, RawMaterialTransferStatus::Returned, input.notes).await
    }

    pub async fn mark_repairing(&self, id: Uuid, input: StatusNoteInput) -> AppResult<RawMaterialTransfer> {
        self.transition(id, RawMaterialTransferStatus::Repairing, input.notes).await
    }

    pub async fn mark_finished(&self, id: Uuid, input: StatusNoteInput) -> AppResult<RawMaterialTransfer> {
        self.transition(id, RawMaterialTransferStatus::Finished, input.notes).await
    }

    /// Status-only move along the repair chain. Quantities are untouched.
    async fn transition(
        &self,
        id: Uuid,
        target: RawMaterialTransferStatus,
        notes: Option<String>,
    ) -> AppResult<RawMaterialTransfer> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, RawMaterialTransferStatus>(
            "SELECT status FROM raw_material_transfers WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Raw material transfer".to_string()))?;

        if !current.can_transition_to(target) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot move raw material transfer {} from {} to {}",
                id, current, target
            )));
        }

        sqlx::query(
            r#"
            UPDATE raw_material_transfers
            SET status = $1, notes = COALESCE($2, notes), updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(target)
        .bind(&notes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let transfer = fetch_transfers(&mut *tx, &[id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Raw material transfer".to_string()))?;
        tx.commit().await?;

        tracing::info!(transfer_id = %id, from = %current, to = %target, "Raw material transfer status changed");
        Ok(transfer)
    }
}

/// Validate a batch request and turn it into per-material demands
fn batch_demands(input: &IssueBatchInput) -> AppResult<Vec<Demand>> {
    input.validate()?;
    input
        .items
        .iter()
        .map(|item| {
            check_field("quantity_issued", validate_quantity(item.quantity_issued))?;
            Ok(Demand {
                id: item.raw_material_id,
                quantity: item.quantity_issued,
            })
        })
        .collect()
}

/// Load issuance batches with user and material names joined in, in the
/// order of `ids`
pub(crate) async fn fetch_transfers(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> AppResult<Vec<RawMaterialTransfer>> {
    let query = format!("{} WHERE t.id = ANY($1) ORDER BY array_position($1, t.id)", TRANSFER_SELECT);
    let transfers = sqlx::query_as::<_, RawMaterialTransfer>(&query)
        .bind(ids)
        .fetch_all(conn)
        .await?;
    Ok(transfers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn batch(quantities: &[&str]) -> IssueBatchInput {
        IssueBatchInput {
            user_id: Uuid::new_v4(),
            items: quantities
                .iter()
                .map(|q| IssueItem {
                    raw_material_id: Uuid::new_v4(),
                    quantity_issued: Decimal::from_str(q).unwrap(),
                })
                .collect(),
            notes: None,
        }
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let err = batch_demands(&batch(&[])).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "items"));
    }

    #[test]
    fn test_quantities_finer_than_stored_scale_are_rejected() {
        for quantity in ["0.0004", "0.0006", "1.2345"] {
            let err = batch_demands(&batch(&["5", quantity])).unwrap_err();
            assert!(
                matches!(err, AppError::Validation { ref field, .. } if field == "quantity_issued"),
                "{} should be rejected",
                quantity
            );
        }
    }

    #[test]
    fn test_non_positive_quantity_is_rejected() {
        let err = batch_demands(&batch(&["0"])).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity_issued"));
    }

    #[test]
    fn test_valid_batch_keeps_request_order() {
        let input = batch(&["30", "0.125"]);
        let demands = batch_demands(&input).unwrap();
        assert_eq!(demands.len(), 2);
        assert_eq!(demands[0].id, input.items[0].raw_material_id);
        assert_eq!(demands[1].quantity, Decimal::new(125, 3));
    }
}
