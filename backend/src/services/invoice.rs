//! Invoices and the finished-goods stock they reserve
//!
//! An invoice holds a reservation in every status except CANCELLED. Moving
//! into or out of that state releases or re-takes the invoiced quantities,
//! and every such movement happens in the same transaction as the invoice
//! row change.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    aggregate_demands, plan_withdrawals, reservation_change, validate_price, validate_quantity,
    Demand, DocumentKind, Invoice, InvoiceItem, InvoiceStatus, InvoiceWithItems, Pagination,
    ReservationChange,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{check_field, ledger, sequence};
use crate::error::{AppError, AppResult};

/// Service for invoices and their stock reservation
#[derive(Clone)]
pub struct InvoiceService {
    db: PgPool,
}

/// Invoice line as submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Defaults to the product's list price
    pub unit_price: Option<Decimal>,
}

/// Input for creating an invoice
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceInput {
    #[validate(length(min = 1, max = 200, message = "Customer name must be 1-200 characters"))]
    pub customer_name: String,
    /// Defaults to DRAFT
    pub status: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<InvoiceLineInput>,
    pub notes: Option<String>,
}

/// Input for updating an invoice. Absent fields are left as they are.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateInvoiceInput {
    #[validate(length(min = 1, max = 200, message = "Customer name must be 1-200 characters"))]
    pub customer_name: Option<String>,
    pub status: Option<String>,
    /// Replaces every line when present
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Option<Vec<InvoiceLineInput>>,
    pub notes: Option<String>,
}

/// Filter for listing invoices
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, FromRow)]
struct PriceRow {
    id: Uuid,
    price: Decimal,
}

/// Line with its unit price settled
#[derive(Debug, Clone, Copy)]
struct PricedLine {
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
}

const INVOICE_COLUMNS: &str =
    "id, invoice_number, customer_name, status, total, balance_due, notes, created_at, updated_at";

fn parse_status(raw: &str) -> AppResult<InvoiceStatus> {
    InvoiceStatus::from_str(raw).ok_or_else(|| AppError::Validation {
        field: "status".to_string(),
        message: format!("Unknown invoice status: {}", raw),
    })
}

fn demands_of(lines: &[PricedLine]) -> Vec<Demand> {
    lines
        .iter()
        .map(|l| Demand {
            id: l.product_id,
            quantity: l.quantity,
        })
        .collect()
}

fn stored_demands(items: &[InvoiceItem]) -> Vec<Demand> {
    items
        .iter()
        .map(|i| Demand {
            id: i.product_id,
            quantity: i.quantity,
        })
        .collect()
}

fn total_of(lines: &[PricedLine]) -> Decimal {
    lines
        .iter()
        .map(|l| l.quantity * l.unit_price)
        .sum::<Decimal>()
        .round_dp(2)
}

/// Balance left to pay. A PAID invoice owes nothing.
fn balance_for(status: InvoiceStatus, outstanding: Decimal) -> Decimal {
    if status == InvoiceStatus::Paid {
        Decimal::ZERO
    } else {
        outstanding
    }
}

/// Apply a reservation change for `lines` against finished-goods stock.
///
/// Reserving checks every product under lock before the first debit, so a
/// shortfall leaves stock untouched.
pub(crate) async fn apply_reservation(
    conn: &mut PgConnection,
    change: ReservationChange,
    lines: &[Demand],
) -> AppResult<()> {
    if lines.is_empty() {
        return Ok(());
    }

    match change {
        ReservationChange::Unchanged => Ok(()),
        ReservationChange::Reserve => {
            let product_ids: Vec<Uuid> = lines.iter().map(|d| d.id).collect();
            let levels = ledger::lock_products(conn, &product_ids).await?;
            let plan = match plan_withdrawals(lines, &levels, "Product") {
                Ok(plan) => plan,
                Err(err) => {
                    tracing::warn!(error = %err, "Invoice reservation rejected");
                    return Err(err.into());
                }
            };
            for demand in &plan {
                ledger::debit_product(conn, demand.id, demand.quantity).await?;
            }
            Ok(())
        }
        ReservationChange::Release => {
            for demand in aggregate_demands(lines)? {
                ledger::credit_product(conn, demand.id, demand.quantity).await?;
            }
            Ok(())
        }
    }
}

impl InvoiceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an invoice under a fresh BILL number, reserving stock unless
    /// it starts out CANCELLED
    pub async fn create(&self, input: CreateInvoiceInput) -> AppResult<InvoiceWithItems> {
        input.validate()?;
        let status = match input.status.as_deref() {
            Some(raw) => parse_status(raw)?,
            None => InvoiceStatus::Draft,
        };

        let mut tx = self.db.begin().await?;

        let lines = price_lines(&mut *tx, &input.items).await?;
        let total = total_of(&lines);
        let balance_due = balance_for(status, total);

        let invoice_number = sequence::next_document_number(&mut *tx, DocumentKind::Bill).await?;

        apply_reservation(&mut *tx, reservation_change(None, Some(status)), &demands_of(&lines)).await?;

        let query = format!(
            r#"
            INSERT INTO invoices (invoice_number, customer_name, status, total, balance_due, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );
        let invoice = sqlx::query_as::<_, Invoice>(&query)
            .bind(&invoice_number)
            .bind(input.customer_name.trim())
            .bind(status)
            .bind(total)
            .bind(balance_due)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

        let items = insert_items(&mut *tx, invoice.id, &lines).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            status = %invoice.status,
            total = %invoice.total,
            "Invoice created"
        );
        Ok(InvoiceWithItems { invoice, items })
    }

    /// Change status, header fields or lines of an invoice
    pub async fn update(&self, invoice_id: Uuid, input: UpdateInvoiceInput) -> AppResult<InvoiceWithItems> {
        input.validate()?;
        let target_status = input.status.as_deref().map(parse_status).transpose()?;

        let mut tx = self.db.begin().await?;

        let current = lock_invoice(&mut *tx, invoice_id).await?;
        let current_items = load_items(&mut *tx, invoice_id).await?;
        let before = current.status;
        let after = target_status.unwrap_or(before);

        let (total, balance_due) = match &input.items {
            Some(new_items) => {
                let lines = price_lines(&mut *tx, new_items).await?;

                // Old lines come back before the new ones are checked
                if before.holds_reservation() {
                    apply_reservation(&mut *tx, ReservationChange::Release, &stored_demands(&current_items))
                        .await?;
                }
                if after.holds_reservation() {
                    apply_reservation(&mut *tx, ReservationChange::Reserve, &demands_of(&lines)).await?;
                }

                sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
                    .bind(invoice_id)
                    .execute(&mut *tx)
                    .await?;
                insert_items(&mut *tx, invoice_id, &lines).await?;

                let total = total_of(&lines);
                let paid = current.total - current.balance_due;
                if paid > total {
                    return Err(AppError::Validation {
                        field: "items".to_string(),
                        message: format!("New total {} is below the {} already received", total, paid),
                    });
                }
                (total, total - paid)
            }
            None => {
                let change = reservation_change(Some(before), Some(after));
                apply_reservation(&mut *tx, change, &stored_demands(&current_items)).await?;
                (current.total, current.balance_due)
            }
        };
        let balance_due = balance_for(after, balance_due);

        let query = format!(
            r#"
            UPDATE invoices
            SET status = $1,
                customer_name = COALESCE($2, customer_name),
                notes = COALESCE($3, notes),
                total = $4,
                balance_due = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );
        let invoice = sqlx::query_as::<_, Invoice>(&query)
            .bind(after)
            .bind(input.customer_name.as_deref().map(str::trim))
            .bind(&input.notes)
            .bind(total)
            .bind(balance_due)
            .bind(invoice_id)
            .fetch_one(&mut *tx)
            .await?;

        let items = load_items(&mut *tx, invoice_id).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            from = %before,
            to = %after,
            items_replaced = input.items.is_some(),
            "Invoice updated"
        );
        Ok(InvoiceWithItems { invoice, items })
    }

    /// Delete an invoice, giving back any stock it still holds
    pub async fn delete(&self, invoice_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let current = lock_invoice(&mut *tx, invoice_id).await?;

        let has_receipts =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM receipts WHERE invoice_id = $1)")
                .bind(invoice_id)
                .fetch_one(&mut *tx)
                .await?;
        if has_receipts {
            return Err(AppError::InvalidStateTransition(format!(
                "Invoice {} has receipts recorded against it",
                current.invoice_number
            )));
        }

        let items = load_items(&mut *tx, invoice_id).await?;
        apply_reservation(
            &mut *tx,
            reservation_change(Some(current.status), None),
            &stored_demands(&items),
        )
        .await?;

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            invoice_number = %current.invoice_number,
            released = current.status.holds_reservation(),
            "Invoice deleted"
        );
        Ok(())
    }

    pub async fn get(&self, invoice_id: Uuid) -> AppResult<InvoiceWithItems> {
        let query = format!("SELECT {} FROM invoices WHERE id = $1", INVOICE_COLUMNS);
        let invoice = sqlx::query_as::<_, Invoice>(&query)
            .bind(invoice_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice".to_string()))?;

        let mut conn = self.db.acquire().await?;
        let items = load_items(&mut *conn, invoice_id).await?;
        Ok(InvoiceWithItems { invoice, items })
    }

    /// List invoice headers, newest first
    pub async fn list(&self, filter: &InvoiceFilter, pagination: &Pagination) -> AppResult<Vec<Invoice>> {
        let query = format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            INVOICE_COLUMNS
        );
        let invoices = sqlx::query_as::<_, Invoice>(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(invoices)
    }
}

/// Validate submitted lines and settle their unit prices
async fn price_lines(conn: &mut PgConnection, items: &[InvoiceLineInput]) -> AppResult<Vec<PricedLine>> {
    if items.is_empty() {
        return Err(AppError::Validation {
            field: "items".to_string(),
            message: "At least one item is required".to_string(),
        });
    }

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let prices = sqlx::query_as::<_, PriceRow>("SELECT id, price FROM products WHERE id = ANY($1)")
        .bind(&product_ids)
        .fetch_all(conn)
        .await?;

    items
        .iter()
        .map(|item| {
            check_field("quantity", validate_quantity(item.quantity))?;
            let list_price = prices
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|p| p.price)
                .ok_or_else(|| AppError::NotFound(format!("Product {}", item.product_id)))?;
            let unit_price = item.unit_price.unwrap_or(list_price);
            check_field("unit_price", validate_price(unit_price))?;

            Ok(PricedLine {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price,
            })
        })
        .collect()
}

async fn insert_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    lines: &[PricedLine],
) -> AppResult<Vec<InvoiceItem>> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (invoice_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, invoice_id, product_id, quantity, unit_price
            "#,
        )
        .bind(invoice_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    Ok(items)
}

async fn load_items(conn: &mut PgConnection, invoice_id: Uuid) -> AppResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, product_id, quantity, unit_price
        FROM invoice_items
        WHERE invoice_id = $1
        ORDER BY product_id, id
        "#,
    )
    .bind(invoice_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Lock an invoice row for the rest of the transaction
pub(crate) async fn lock_invoice(conn: &mut PgConnection, invoice_id: Uuid) -> AppResult<Invoice> {
    let query = format!("SELECT {} FROM invoices WHERE id = $1 FOR UPDATE", INVOICE_COLUMNS);
    sqlx::query_as::<_, Invoice>(&query)
        .bind(invoice_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i64, unit_price: &str) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            quantity: Decimal::from(quantity),
            unit_price: unit_price.parse().unwrap(),
        }
    }

    #[test]
    fn test_total_rounds_to_cents() {
        let lines = vec![line(3, "0.333"), line(2, "10.00")];
        assert_eq!(total_of(&lines), "21.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_paid_invoice_owes_nothing() {
        let outstanding = "5.00".parse::<Decimal>().unwrap();
        assert_eq!(balance_for(InvoiceStatus::Paid, outstanding), Decimal::ZERO);
        assert_eq!(balance_for(InvoiceStatus::Draft, outstanding), outstanding);
        assert_eq!(balance_for(InvoiceStatus::Unpaid, outstanding), outstanding);
    }

    #[test]
    fn test_parse_status_rejects_unknown_values() {
        assert_eq!(parse_status("FINAL").unwrap(), InvoiceStatus::Final);
        assert!(matches!(parse_status("final"), Err(AppError::Validation { .. })));
        assert!(matches!(parse_status("VOID"), Err(AppError::Validation { .. })));
    }
}
