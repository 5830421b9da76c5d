//! Bill of materials maintenance and resolution

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{resolve_requirements, validate_quantity, MaterialRequirement, ProductStructure};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::check_field;
use crate::error::{AppError, AppResult};

/// Service for product structures (bills of materials)
#[derive(Clone)]
pub struct BomService {
    db: PgPool,
}

/// Input for adding a BOM line
#[derive(Debug, Deserialize)]
pub struct AddStructureLineInput {
    pub raw_material_id: Uuid,
    pub quantity_required: Decimal,
}

const STRUCTURE_QUERY: &str = r#"
    SELECT ps.id, ps.product_id, ps.raw_material_id,
           rm.name AS raw_material_name, rm.unit, ps.quantity_required
    FROM product_structures ps
    JOIN raw_materials rm ON rm.id = ps.raw_material_id
    WHERE ps.product_id = $1
    ORDER BY ps.raw_material_id
"#;

/// Load a product's structure on the caller's connection
pub async fn load_structure(
    conn: &mut PgConnection,
    product_id: Uuid,
) -> AppResult<Vec<ProductStructure>> {
    let lines = sqlx::query_as::<_, ProductStructure>(STRUCTURE_QUERY)
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Resolve requirements for `quantity` units inside an open transaction
pub async fn resolve_in(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: Decimal,
) -> AppResult<Vec<MaterialRequirement>> {
    let structure = load_structure(conn, product_id).await?;
    Ok(resolve_requirements(product_id, &structure, quantity)?)
}

impl BomService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List the structure lines of a product
    pub async fn structure(&self, product_id: Uuid) -> AppResult<Vec<ProductStructure>> {
        self.ensure_product(product_id).await?;

        let lines = sqlx::query_as::<_, ProductStructure>(STRUCTURE_QUERY)
            .bind(product_id)
            .fetch_all(&self.db)
            .await?;
        Ok(lines)
    }

    /// Raw materials needed to make `quantity` units of a product
    pub async fn resolve(
        &self,
        product_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<Vec<MaterialRequirement>> {
        let mut conn = self.db.acquire().await?;
        resolve_in(&mut *conn, product_id, quantity).await
    }

    /// Add a raw material to a product's structure
    pub async fn add_line(
        &self,
        product_id: Uuid,
        input: AddStructureLineInput,
    ) -> AppResult<ProductStructure> {
        check_field("quantity_required", validate_quantity(input.quantity_required))?;
        self.ensure_product(product_id).await?;

        let line = sqlx::query_as::<_, ProductStructure>(
            r#"
            WITH inserted AS (
                INSERT INTO product_structures (product_id, raw_material_id, quantity_required)
                VALUES ($1, $2, $3)
                RETURNING id, product_id, raw_material_id, quantity_required
            )
            SELECT i.id, i.product_id, i.raw_material_id,
                   rm.name AS raw_material_name, rm.unit, i.quantity_required
            FROM inserted i
            JOIN raw_materials rm ON rm.id = i.raw_material_id
            "#,
        )
        .bind(product_id)
        .bind(input.raw_material_id)
        .bind(input.quantity_required)
        .fetch_optional(&self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound("Raw material".to_string())
            }
            other => AppError::from(other),
        })?
        .ok_or_else(|| AppError::NotFound("Raw material".to_string()))?;

        tracing::info!(
            product_id = %product_id,
            raw_material_id = %line.raw_material_id,
            quantity_required = %line.quantity_required,
            "BOM line added"
        );
        Ok(line)
    }

    /// Remove one raw material from a product's structure
    pub async fn remove_line(&self, product_id: Uuid, raw_material_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM product_structures WHERE product_id = $1 AND raw_material_id = $2",
        )
        .bind(product_id)
        .bind(raw_material_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product structure line".to_string()));
        }

        tracing::info!(product_id = %product_id, raw_material_id = %raw_material_id, "BOM line removed");
        Ok(())
    }

    async fn ensure_product(&self, product_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }
}
