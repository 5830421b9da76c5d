//! Ledger store primitives
//!
//! Row locks and guarded balance movements on raw materials, products and
//! user inventories. Every function takes the caller's transaction so the
//! sufficiency check and the write commit or roll back together.

use rust_decimal::Decimal;
use shared::StockLevel;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Lock raw material rows and read their central stock
pub async fn lock_raw_materials(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<StockLevel>> {
    let levels = sqlx::query_as::<_, StockLevel>(
        r#"
        SELECT id, name, quantity AS available
        FROM raw_materials
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(levels)
}

/// Lock product rows and read their finished-goods stock
pub async fn lock_products(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<StockLevel>> {
    let levels = sqlx::query_as::<_, StockLevel>(
        r#"
        SELECT id, name, quantity AS available
        FROM products
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(levels)
}

/// Lock a user's inventory rows for the given materials.
///
/// Materials the user has never received are simply absent from the result.
pub async fn lock_user_inventory(
    conn: &mut PgConnection,
    user_id: Uuid,
    raw_material_ids: &[Uuid],
) -> AppResult<Vec<StockLevel>> {
    let levels = sqlx::query_as::<_, StockLevel>(
        r#"
        SELECT ui.raw_material_id AS id, rm.name, ui.quantity AS available
        FROM user_inventories ui
        JOIN raw_materials rm ON rm.id = ui.raw_material_id
        WHERE ui.user_id = $1 AND ui.raw_material_id = ANY($2)
        ORDER BY ui.raw_material_id
        FOR UPDATE OF ui
        "#,
    )
    .bind(user_id)
    .bind(raw_material_ids)
    .fetch_all(conn)
    .await?;

    Ok(levels)
}

/// Take `quantity` out of central raw material stock
pub async fn debit_raw_material(
    conn: &mut PgConnection,
    raw_material_id: Uuid,
    quantity: Decimal,
) -> AppResult<Decimal> {
    let remaining = sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE raw_materials
        SET quantity = quantity - $1, updated_at = NOW()
        WHERE id = $2 AND quantity >= $1
        RETURNING quantity
        "#,
    )
    .bind(quantity)
    .bind(raw_material_id)
    .fetch_optional(&mut *conn)
    .await?;

    match remaining {
        Some(remaining) => Ok(remaining),
        None => {
            let level = sqlx::query_as::<_, StockLevel>(
                "SELECT id, name, quantity AS available FROM raw_materials WHERE id = $1",
            )
            .bind(raw_material_id)
            .fetch_optional(&mut *conn)
            .await?;
            Err(shortfall(level, "Raw material", quantity))
        }
    }
}

/// Add `quantity` to central raw material stock
pub async fn credit_raw_material(
    conn: &mut PgConnection,
    raw_material_id: Uuid,
    quantity: Decimal,
) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE raw_materials
        SET quantity = quantity + $1, updated_at = NOW()
        WHERE id = $2
        RETURNING quantity
        "#,
    )
    .bind(quantity)
    .bind(raw_material_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Raw material".to_string()))
}

/// Take `quantity` out of finished-goods stock
pub async fn debit_product(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: Decimal,
) -> AppResult<Decimal> {
    let remaining = sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE products
        SET quantity = quantity - $1, updated_at = NOW()
        WHERE id = $2 AND quantity >= $1
        RETURNING quantity
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    match remaining {
        Some(remaining) => Ok(remaining),
        None => {
            let level = sqlx::query_as::<_, StockLevel>(
                "SELECT id, name, quantity AS available FROM products WHERE id = $1",
            )
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
            Err(shortfall(level, "Product", quantity))
        }
    }
}

/// Add `quantity` to finished-goods stock
pub async fn credit_product(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: Decimal,
) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE products
        SET quantity = quantity + $1, updated_at = NOW()
        WHERE id = $2
        RETURNING quantity
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Add `quantity` to a user's float, creating the row on first credit
pub async fn credit_user_inventory(
    conn: &mut PgConnection,
    user_id: Uuid,
    raw_material_id: Uuid,
    quantity: Decimal,
) -> AppResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        r#"
        INSERT INTO user_inventories (user_id, raw_material_id, quantity, unit)
        SELECT $1, rm.id, $3, rm.unit
        FROM raw_materials rm
        WHERE rm.id = $2
        ON CONFLICT (user_id, raw_material_id) DO UPDATE
        SET quantity = user_inventories.quantity + EXCLUDED.quantity, updated_at = NOW()
        RETURNING quantity
        "#,
    )
    .bind(user_id)
    .bind(raw_material_id)
    .bind(quantity)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Raw material".to_string()))
}

/// Take `quantity` out of a user's float
pub async fn debit_user_inventory(
    conn: &mut PgConnection,
    user_id: Uuid,
    raw_material_id: Uuid,
    quantity: Decimal,
) -> AppResult<Decimal> {
    let remaining = sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE user_inventories
        SET quantity = quantity - $1, updated_at = NOW()
        WHERE user_id = $2 AND raw_material_id = $3 AND quantity >= $1
        RETURNING quantity
        "#,
    )
    .bind(quantity)
    .bind(user_id)
    .bind(raw_material_id)
    .fetch_optional(&mut *conn)
    .await?;

    match remaining {
        Some(remaining) => Ok(remaining),
        None => {
            let level = sqlx::query_as::<_, StockLevel>(
                r#"
                SELECT rm.id, rm.name, COALESCE(ui.quantity, 0) AS available
                FROM raw_materials rm
                LEFT JOIN user_inventories ui
                       ON ui.raw_material_id = rm.id AND ui.user_id = $1
                WHERE rm.id = $2
                "#,
            )
            .bind(user_id)
            .bind(raw_material_id)
            .fetch_optional(&mut *conn)
            .await?;

            Err(match level {
                Some(level) => AppError::InsufficientMaterial {
                    material: level.name,
                    required: quantity,
                    available: level.available,
                },
                None => AppError::NotFound("Raw material".to_string()),
            })
        }
    }
}

/// Check that a user exists
pub async fn ensure_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(conn)
        .await?;

    if !exists {
        return Err(AppError::NotFound("User".to_string()));
    }
    Ok(())
}

fn shortfall(level: Option<StockLevel>, entity: &str, requested: Decimal) -> AppError {
    match level {
        Some(level) => AppError::InsufficientStock {
            entity: level.name,
            available: level.available,
            requested,
        },
        None => AppError::NotFound(entity.to_string()),
    }
}
