//! Finished goods transfers from users to central stock
//!
//! Creating a transfer draws the bill of materials out of the user's
//! inventory and logs one consumption row per material. Resolving it either
//! accepts the goods or hands the logged quantities back to the user.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    check_resolution, plan_consumption, validate_quantity, Pagination, ProductTransfer,
    ProductTransferStatus, RawMaterialConsumption,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{bom, check_field, ledger};
use crate::error::{AppError, AppResult};

/// Service for manufacturing transfers
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

/// Input for submitting finished goods
#[derive(Debug, Deserialize)]
pub struct CreateTransferInput {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity_sent: Decimal,
    pub notes: Option<String>,
}

/// Input for accepting, rejecting or cancelling a transfer
#[derive(Debug, Deserialize)]
pub struct ResolveTransferInput {
    /// RECEIVED, REJECTED or CANCELLED
    pub status: String,
    pub notes: Option<String>,
    pub received_by: Option<Uuid>,
}

/// Filter for listing transfers
#[derive(Debug, Default, Deserialize)]
pub struct TransferFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<ProductTransferStatus>,
}

#[derive(Debug, FromRow)]
struct LockedTransfer {
    user_id: Uuid,
    status: ProductTransferStatus,
}

#[derive(Debug, FromRow)]
struct RestoreLine {
    raw_material_id: Uuid,
    quantity: Decimal,
}

const PRODUCT_TRANSFER_SELECT: &str = r#"
    SELECT pt.id, pt.user_id, pt.product_id, p.name AS product_name, pt.quantity_sent,
           pt.status, pt.notes, pt.received_by, pt.received_at, pt.created_at
    FROM product_transfers pt
    JOIN products p ON p.id = pt.product_id
"#;

impl TransferService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Submit finished goods, consuming the bill of materials from the
    /// user's inventory. Central product stock is not touched until receipt.
    pub async fn create_transfer(&self, input: CreateTransferInput) -> AppResult<ProductTransfer> {
        check_field("quantity_sent", validate_quantity(input.quantity_sent))?;

        let mut tx = self.db.begin().await?;
        ledger::ensure_user(&mut *tx, input.user_id).await?;

        let product_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(input.product_id)
                .fetch_one(&mut *tx)
                .await?;
        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let requirements = bom::resolve_in(&mut *tx, input.product_id, input.quantity_sent).await?;
        let material_ids: Vec<Uuid> = requirements.iter().map(|r| r.raw_material_id).collect();

        let inventory = ledger::lock_user_inventory(&mut *tx, input.user_id, &material_ids).await?;
        if let Err(err) = plan_consumption(&requirements, &inventory) {
            tracing::warn!(
                user_id = %input.user_id,
                product_id = %input.product_id,
                error = %err,
                "Transfer rejected"
            );
            return Err(err.into());
        }

        let transfer_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO product_transfers (user_id, product_id, quantity_sent, status, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.user_id)
        .bind(input.product_id)
        .bind(input.quantity_sent)
        .bind(ProductTransferStatus::Sent)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        for requirement in &requirements {
            ledger::debit_user_inventory(
                &mut *tx,
                input.user_id,
                requirement.raw_material_id,
                requirement.quantity,
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO raw_material_consumptions (
                    user_id, product_id, raw_material_id, product_transfer_id,
                    quantity_used, product_transfer_quantity, unit, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(input.user_id)
            .bind(input.product_id)
            .bind(requirement.raw_material_id)
            .bind(transfer_id)
            .bind(requirement.quantity)
            .bind(input.quantity_sent)
            .bind(&requirement.unit)
            .bind(&input.notes)
            .execute(&mut *tx)
            .await?;
        }

        let transfer = fetch_transfer(&mut *tx, transfer_id).await?;
        tx.commit().await?;

        tracing::info!(
            transfer_id = %transfer.id,
            user_id = %transfer.user_id,
            product_id = %transfer.product_id,
            quantity_sent = %transfer.quantity_sent,
            materials = requirements.len(),
            "Product transfer created"
        );
        Ok(transfer)
    }

    /// Move a transfer out of SENT. A second resolution of the same transfer
    /// fails with `AlreadyResolved` and has no effect.
    pub async fn resolve_transfer(
        &self,
        transfer_id: Uuid,
        input: ResolveTransferInput,
    ) -> AppResult<ProductTransfer> {
        let target = ProductTransferStatus::from_str(&input.status).ok_or_else(|| {
            AppError::Validation {
                field: "status".to_string(),
                message: format!("Unknown transfer status: {}", input.status),
            }
        })?;

        let mut tx = self.db.begin().await?;

        let locked = sqlx::query_as::<_, LockedTransfer>(
            "SELECT user_id, status FROM product_transfers WHERE id = $1 FOR UPDATE",
        )
        .bind(transfer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product transfer".to_string()))?;

        check_resolution(transfer_id, locked.status, target)?;

        if target.restores_materials() {
            // Quantities logged at creation, not the current BOM
            let lines = sqlx::query_as::<_, RestoreLine>(
                r#"
                SELECT raw_material_id, SUM(quantity_used) AS quantity
                FROM raw_material_consumptions
                WHERE product_transfer_id = $1
                GROUP BY raw_material_id
                ORDER BY raw_material_id
                "#,
            )
            .bind(transfer_id)
            .fetch_all(&mut *tx)
            .await?;

            for line in &lines {
                ledger::credit_user_inventory(&mut *tx, locked.user_id, line.raw_material_id, line.quantity)
                    .await?;
            }
            tracing::info!(
                transfer_id = %transfer_id,
                user_id = %locked.user_id,
                materials = lines.len(),
                "Consumed materials restored"
            );
        }

        let resolved_at: DateTime<Utc> = Utc::now();
        sqlx::query(
            r#"
            UPDATE product_transfers
            SET status = $1, notes = COALESCE($2, notes), received_by = $3, received_at = $4
            WHERE id = $5
            "#,
        )
        .bind(target)
        .bind(&input.notes)
        .bind(input.received_by)
        .bind(resolved_at)
        .bind(transfer_id)
        .execute(&mut *tx)
        .await?;

        let transfer = fetch_transfer(&mut *tx, transfer_id).await?;
        tx.commit().await?;

        tracing::info!(transfer_id = %transfer_id, status = %target, "Product transfer resolved");
        Ok(transfer)
    }

    pub async fn get(&self, transfer_id: Uuid) -> AppResult<ProductTransfer> {
        let mut conn = self.db.acquire().await?;
        fetch_transfer(&mut *conn, transfer_id).await
    }

    /// List transfers, newest first
    pub async fn list(
        &self,
        filter: &TransferFilter,
        pagination: &Pagination,
    ) -> AppResult<Vec<ProductTransfer>> {
        let query = format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR pt.user_id = $1)
              AND ($2::varchar IS NULL OR pt.status = $2)
            ORDER BY pt.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            PRODUCT_TRANSFER_SELECT
        );

        let transfers = sqlx::query_as::<_, ProductTransfer>(&query)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(transfers)
    }

    /// Consumption rows logged when the transfer was created
    pub async fn consumptions(&self, transfer_id: Uuid) -> AppResult<Vec<RawMaterialConsumption>> {
        // Surface NotFound for unknown transfers instead of an empty list
        self.get(transfer_id).await?;

        let rows = sqlx::query_as::<_, RawMaterialConsumption>(
            r#"
            SELECT id, user_id, product_id, raw_material_id, product_transfer_id,
                   quantity_used, product_transfer_quantity, unit, notes, created_at
            FROM raw_material_consumptions
            WHERE product_transfer_id = $1
            ORDER BY raw_material_id
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

async fn fetch_transfer(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<ProductTransfer> {
    let query = format!("{} WHERE pt.id = $1", PRODUCT_TRANSFER_SELECT);
    sqlx::query_as::<_, ProductTransfer>(&query)
        .bind(transfer_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Product transfer".to_string()))
}
