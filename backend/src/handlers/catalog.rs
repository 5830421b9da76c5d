//! HTTP handlers for raw materials, products and bills of materials

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{MaterialRequirement, Pagination, Product, ProductStructure, RawMaterial};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::bom::{AddStructureLineInput, BomService};
use crate::services::catalog::{
    CatalogService, CreateProductInput, CreateRawMaterialInput, RestockInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RequirementsQuery {
    pub quantity: Decimal,
}

pub async fn create_raw_material(
    State(state): State<AppState>,
    Json(input): Json<CreateRawMaterialInput>,
) -> AppResult<(StatusCode, Json<RawMaterial>)> {
    let service = CatalogService::new(state.db);
    let material = service.create_raw_material(input).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn list_raw_materials(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<RawMaterial>>> {
    let service = CatalogService::new(state.db);
    let materials = service.list_raw_materials(&pagination).await?;
    Ok(Json(materials))
}

pub async fn get_raw_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RawMaterial>> {
    let service = CatalogService::new(state.db);
    let material = service.get_raw_material(id).await?;
    Ok(Json(material))
}

/// Add to central stock of a raw material
pub async fn restock_raw_material(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<RestockInput>,
) -> AppResult<Json<RawMaterial>> {
    let service = CatalogService::new(state.db);
    let material = service.restock_raw_material(id, input).await?;
    Ok(Json(material))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let service = CatalogService::new(state.db);
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<Product>>> {
    let service = CatalogService::new(state.db);
    let products = service.list_products(&pagination).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = CatalogService::new(state.db);
    let product = service.get_product(id).await?;
    Ok(Json(product))
}

/// List a product's bill of materials
pub async fn get_structure(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProductStructure>>> {
    let service = BomService::new(state.db);
    let lines = service.structure(product_id).await?;
    Ok(Json(lines))
}

pub async fn add_structure_line(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<AddStructureLineInput>,
) -> AppResult<(StatusCode, Json<ProductStructure>)> {
    let service = BomService::new(state.db);
    let line = service.add_line(product_id, input).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn remove_structure_line(
    State(state): State<AppState>,
    Path((product_id, raw_material_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let service = BomService::new(state.db);
    service.remove_line(product_id, raw_material_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Raw materials needed for a quantity of the product
pub async fn get_requirements(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<RequirementsQuery>,
) -> AppResult<Json<Vec<MaterialRequirement>>> {
    let service = BomService::new(state.db);
    let requirements = service.resolve(product_id, query.quantity).await?;
    Ok(Json(requirements))
}
