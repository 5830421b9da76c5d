//! Manufacturing completion: turns specific issuance batches into finished
//! goods stock

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_completion, validate_quantity, IssuedBatch, ManufacturingRun, RawMaterialTransfer,
    RawMaterialTransferStatus,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{bom, check_field, issuance, ledger};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ManufacturingService {
    db: PgPool,
}

/// Input for completing a manufacturing run
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteManufacturingInput {
    pub product_id: Uuid,
    pub quantity_produced: Decimal,
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "At least one raw material transfer is required"))]
    pub transfer_ids: Vec<Uuid>,
    pub notes: Option<String>,
}

/// Completed run with the batches it consumed
#[derive(Debug, Serialize)]
pub struct CompletionResult {
    pub run: ManufacturingRun,
    pub transfers: Vec<RawMaterialTransfer>,
    pub product_quantity: Decimal,
}

impl ManufacturingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Mark the listed batches USED and add the produced quantity to
    /// finished-goods stock.
    ///
    /// The batches must belong to the user, still be SENT and together
    /// cover the bill of materials for `quantity_produced`.
    pub async fn complete(&self, input: CompleteManufacturingInput) -> AppResult<CompletionResult> {
        input.validate()?;
        check_field("quantity_produced", validate_quantity(input.quantity_produced))?;

        let mut transfer_ids = input.transfer_ids.clone();
        transfer_ids.sort();
        transfer_ids.dedup();

        let mut tx = self.db.begin().await?;

        let products = ledger::lock_products(&mut *tx, &[input.product_id]).await?;
        if products.is_empty() {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let batches = sqlx::query_as::<_, IssuedBatch>(
            r#"
            SELECT id, user_id, raw_material_id, quantity_issued, status
            FROM raw_material_transfers
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&transfer_ids)
        .fetch_all(&mut *tx)
        .await?;

        if let Some(missing) = transfer_ids
            .iter()
            .find(|id| !batches.iter().any(|b| b.id == **id))
        {
            return Err(AppError::NotFound(format!("Raw material transfer {}", missing)));
        }

        let requirements = bom::resolve_in(&mut *tx, input.product_id, input.quantity_produced).await?;
        if let Err(err) = validate_completion(input.user_id, &requirements, &batches) {
            tracing::warn!(
                user_id = %input.user_id,
                product_id = %input.product_id,
                error = %err,
                "Manufacturing completion rejected"
            );
            return Err(err.into());
        }

        let run = sqlx::query_as::<_, ManufacturingRun>(
            r#"
            INSERT INTO manufacturing_runs (user_id, product_id, quantity_produced, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, product_id, quantity_produced, notes, created_at
            "#,
        )
        .bind(input.user_id)
        .bind(input.product_id)
        .bind(input.quantity_produced)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE raw_material_transfers
            SET status = $1, manufacturing_run_id = $2, updated_at = NOW()
            WHERE id = ANY($3)
            "#,
        )
        .bind(RawMaterialTransferStatus::Used)
        .bind(run.id)
        .bind(&transfer_ids)
        .execute(&mut *tx)
        .await?;

        let product_quantity =
            ledger::credit_product(&mut *tx, input.product_id, input.quantity_produced).await?;
        let transfers = issuance::fetch_transfers(&mut *tx, &transfer_ids).await?;
        tx.commit().await?;

        tracing::info!(
            run_id = %run.id,
            product_id = %run.product_id,
            quantity_produced = %run.quantity_produced,
            batches = transfers.len(),
            "Manufacturing run completed"
        );

        Ok(CompletionResult {
            run,
            transfers,
            product_quantity,
        })
    }

    /// Past runs for a product, newest first
    pub async fn list_runs(&self, product_id: Option<Uuid>) -> AppResult<Vec<ManufacturingRun>> {
        let runs = sqlx::query_as::<_, ManufacturingRun>(
            r#"
            SELECT id, user_id, product_id, quantity_produced, notes, created_at
            FROM manufacturing_runs
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(runs)
    }
}
