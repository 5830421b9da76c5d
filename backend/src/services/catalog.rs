//! Catalog maintenance for raw materials and products

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_price, validate_quantity, validate_unit, Pagination, Product, RawMaterial};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{check_field, ledger};
use crate::error::{AppError, AppResult};

/// Catalog service for raw materials and finished products
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Input for registering a raw material
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRawMaterialInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub unit: String,
    /// Opening central stock
    #[serde(default)]
    pub quantity: Decimal,
}

/// Input for registering a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub cost_price: Decimal,
}

/// Input for adding to central raw material stock
#[derive(Debug, Deserialize)]
pub struct RestockInput {
    pub quantity: Decimal,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a raw material
    pub async fn create_raw_material(&self, input: CreateRawMaterialInput) -> AppResult<RawMaterial> {
        input.validate()?;
        check_field("unit", validate_unit(&input.unit))?;
        if input.quantity < Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Opening stock cannot be negative".to_string(),
            });
        }

        let material = sqlx::query_as::<_, RawMaterial>(
            r#"
            INSERT INTO raw_materials (name, quantity, unit)
            VALUES ($1, $2, $3)
            RETURNING id, name, quantity, unit, created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.quantity)
        .bind(input.unit.trim())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(raw_material_id = %material.id, name = %material.name, "Raw material registered");
        Ok(material)
    }

    pub async fn list_raw_materials(&self, pagination: &Pagination) -> AppResult<Vec<RawMaterial>> {
        let materials = sqlx::query_as::<_, RawMaterial>(
            r#"
            SELECT id, name, quantity, unit, created_at, updated_at
            FROM raw_materials
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(materials)
    }

    pub async fn get_raw_material(&self, id: Uuid) -> AppResult<RawMaterial> {
        sqlx::query_as::<_, RawMaterial>(
            "SELECT id, name, quantity, unit, created_at, updated_at FROM raw_materials WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Raw material".to_string()))
    }

    /// Add a positive delta to central stock
    pub async fn restock_raw_material(&self, id: Uuid, input: RestockInput) -> AppResult<RawMaterial> {
        check_field("quantity", validate_quantity(input.quantity))?;

        let mut tx = self.db.begin().await?;
        let balance = ledger::credit_raw_material(&mut *tx, id, input.quantity).await?;
        tx.commit().await?;

        tracing::info!(raw_material_id = %id, added = %input.quantity, balance = %balance, "Raw material restocked");
        self.get_raw_material(id).await
    }

    /// Register a product with zero finished-goods stock
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        check_field("price", validate_price(input.price))?;
        check_field("cost_price", validate_price(input.cost_price))?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, price, cost_price)
            VALUES ($1, $2, $3)
            RETURNING id, name, quantity, price, cost_price, created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.price)
        .bind(input.cost_price)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product registered");
        Ok(product)
    }

    pub async fn list_products(&self, pagination: &Pagination) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, quantity, price, cost_price, created_at, updated_at
            FROM products
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, quantity, price, cost_price, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }
}
