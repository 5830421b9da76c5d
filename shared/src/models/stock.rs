//! Stock-bearing entities: raw materials, finished products, bills of material
//! and per-user material floats

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Centrally held raw material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RawMaterial {
    pub id: Uuid,
    pub name: String,
    /// Central stock, never negative
    pub quantity: Decimal,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Finished good that can be manufactured and invoiced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Finished-goods stock, never negative
    pub quantity: Decimal,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a product's bill of materials.
///
/// `quantity_required` is expressed per single unit of the product. The
/// material name and unit are joined in for display and error reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductStructure {
    pub id: Uuid,
    pub product_id: Uuid,
    pub raw_material_id: Uuid,
    pub raw_material_name: String,
    pub unit: String,
    pub quantity_required: Decimal,
}

/// A user's personal raw-material balance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserInventory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub raw_material_id: Uuid,
    pub raw_material_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub updated_at: DateTime<Utc>,
}
