//! WebAssembly module for the stock ledger
//!
//! Provides client-side previews for:
//! - Document number formatting per financial year
//! - Bill of materials requirements before a transfer is submitted
//! - Stock effect of an invoice status change
//! - Offline input validation

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{
    format_document_number, reservation_change, resolve_requirements, DocumentKind,
    FinancialYear, ReservationChange,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

fn parse_kind(kind: &str) -> Result<DocumentKind, JsValue> {
    DocumentKind::from_str(kind).ok_or_else(|| js_error(format!("Unknown document kind: {}", kind)))
}

/// Format a document number, e.g. `("bill", 2024, 7)` gives `BILL-2024-2025-0007`
#[wasm_bindgen]
pub fn preview_document_number(kind: &str, start_year: i32, number: i64) -> Result<String, JsValue> {
    let kind = parse_kind(kind)?;
    if number < 1 {
        return Err(js_error("Document numbers start at 1"));
    }
    Ok(format_document_number(kind, FinancialYear::starting(start_year), number))
}

/// Financial year label for today's date, e.g. `2024-2025`
#[wasm_bindgen]
pub fn current_financial_year() -> String {
    FinancialYear::current().to_string()
}

/// Financial year label for an ISO date
#[wasm_bindgen]
pub fn financial_year_for(date: &str) -> Result<String, JsValue> {
    let date = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| js_error(format!("Invalid date: {}", e)))?;
    Ok(FinancialYear::for_date(date).to_string())
}

/// Scale a product structure by a quantity.
///
/// `structure_json` is the array returned by the structure endpoint. The
/// result is a JSON array of material requirements.
#[wasm_bindgen]
pub fn preview_requirements(
    product_id: &str,
    structure_json: &str,
    quantity: f64,
) -> Result<String, JsValue> {
    let product_id = uuid::Uuid::parse_str(product_id)
        .map_err(|e| js_error(format!("Invalid product id: {}", e)))?;
    let structure: Vec<ProductStructure> = serde_json::from_str(structure_json)
        .map_err(|e| js_error(format!("Invalid structure JSON: {}", e)))?;
    let quantity = Decimal::try_from(quantity).map_err(js_error)?;

    let requirements =
        resolve_requirements(product_id, &structure, quantity).map_err(js_error)?;
    serde_json::to_string(&requirements).map_err(js_error)
}

/// Stock effect of moving an invoice between statuses.
///
/// Pass an empty string for a status that does not exist (creation or
/// deletion). Returns `RESERVE`, `RELEASE` or `UNCHANGED`.
#[wasm_bindgen]
pub fn preview_reservation(before: &str, after: &str) -> Result<String, JsValue> {
    let parse = |s: &str| -> Result<Option<InvoiceStatus>, JsValue> {
        if s.is_empty() {
            return Ok(None);
        }
        InvoiceStatus::from_str(s)
            .map(Some)
            .ok_or_else(|| js_error(format!("Unknown invoice status: {}", s)))
    };

    let change = match reservation_change(parse(before)?, parse(after)?) {
        ReservationChange::Reserve => "RESERVE",
        ReservationChange::Release => "RELEASE",
        ReservationChange::Unchanged => "UNCHANGED",
    };
    Ok(change.to_string())
}

/// Check a quantity before submitting it
#[wasm_bindgen]
pub fn validate_quantity_input(quantity: f64) -> bool {
    Decimal::try_from(quantity)
        .map(|q| validate_quantity(q).is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_document_number() {
        assert_eq!(
            preview_document_number("bill", 2024, 7).unwrap(),
            "BILL-2024-2025-0007"
        );
        assert_eq!(
            preview_document_number("vendor_payment", 2023, 12).unwrap(),
            "VPMT-2023-2024-0012"
        );
    }

    #[test]
    fn test_financial_year_for() {
        assert_eq!(financial_year_for("2025-03-31").unwrap(), "2024-2025");
        assert_eq!(financial_year_for("2025-04-01").unwrap(), "2025-2026");
    }

    #[test]
    fn test_preview_requirements() {
        let product = uuid::Uuid::new_v4();
        let structure = format!(
            r#"[{{"id":"{}","product_id":"{}","raw_material_id":"{}","raw_material_name":"Copper","unit":"g","quantity_required":"2.5"}}]"#,
            uuid::Uuid::new_v4(),
            product,
            uuid::Uuid::new_v4()
        );

        let json = preview_requirements(&product.to_string(), &structure, 4.0).unwrap();
        let requirements: Vec<shared::MaterialRequirement> = serde_json::from_str(&json).unwrap();
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].quantity, Decimal::from(10));
    }

    #[test]
    fn test_preview_reservation() {
        assert_eq!(preview_reservation("", "DRAFT").unwrap(), "RESERVE");
        assert_eq!(preview_reservation("DRAFT", "FINAL").unwrap(), "UNCHANGED");
        assert_eq!(preview_reservation("PAID", "CANCELLED").unwrap(), "RELEASE");
        assert_eq!(preview_reservation("CANCELLED", "").unwrap(), "UNCHANGED");
    }
}
