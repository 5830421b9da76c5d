//! Route definitions for the stock ledger API

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/raw-materials", raw_material_routes())
        .nest("/products", product_routes())
        .nest("/issuances", issuance_routes())
        .route("/users/:user_id/inventory", get(handlers::get_user_inventory))
        .nest("/transfers", transfer_routes())
        .nest("/manufacturing", manufacturing_routes())
        .nest("/invoices", invoice_routes())
        .nest("/sequences", sequence_routes())
        .nest("/receipts", receipt_routes())
        .route(
            "/vendor-payments",
            get(handlers::list_vendor_payments).post(handlers::record_vendor_payment),
        )
        .route(
            "/vendor-credit-notes",
            get(handlers::list_vendor_credit_notes).post(handlers::record_vendor_credit_note),
        )
        .nest("/consumptions", consumption_routes())
}

fn raw_material_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_raw_materials).post(handlers::create_raw_material),
        )
        .route("/:id", get(handlers::get_raw_material))
        .route("/:id/restock", post(handlers::restock_raw_material))
}

/// Products and their bills of materials
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/:id", get(handlers::get_product))
        .route(
            "/:id/structure",
            get(handlers::get_structure).post(handlers::add_structure_line),
        )
        .route(
            "/:id/structure/:raw_material_id",
            delete(handlers::remove_structure_line),
        )
        .route("/:id/requirements", get(handlers::get_requirements))
}

/// Raw material issuance and the repair workflow
fn issuance_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_issuances).post(handlers::issue_batch))
        .route("/:id", get(handlers::get_issuance))
        .route("/:id/return", post(handlers::mark_returned))
        .route("/:id/repair", post(handlers::mark_repairing))
        .route("/:id/finish", post(handlers::mark_finished))
}

fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers).post(handlers::create_transfer))
        .route("/:id", get(handlers::get_transfer))
        .route("/:id/resolve", post(handlers::resolve_transfer))
        .route("/:id/consumptions", get(handlers::get_transfer_consumptions))
}

fn manufacturing_routes() -> Router<AppState> {
    Router::new()
        .route("/complete", post(handlers::complete_manufacturing))
        .route("/runs", get(handlers::list_manufacturing_runs))
}

fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_invoices).post(handlers::create_invoice))
        .route(
            "/:id",
            get(handlers::get_invoice)
                .put(handlers::update_invoice)
                .delete(handlers::delete_invoice),
        )
}

/// Document counters, one per domain and financial year
fn sequence_routes() -> Router<AppState> {
    Router::new()
        .route("/:domain", get(handlers::get_sequence))
        .route("/:domain/next", post(handlers::next_number))
        .route("/:domain/sync", post(handlers::sync_sequence))
}

fn receipt_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_receipts).post(handlers::record_receipt))
}

fn consumption_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_consumption_log))
        .route("/usage", get(handlers::get_material_usage))
}
