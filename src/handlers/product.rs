// src/handlers/product.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::product::{CreateProductRequest, ProductResponse, UpdateProductRequest};
use crate::error::{map_unique_violation, AppError};
use crate::models::product::Product;
use crate::state::AppState;

const PRODUCT_COLUMNS: &str =
    "id, sku, name, category_id, brand_id, unit_price, cost_price, created_at, updated_at";

// GET /products - List all products
#[instrument(skip(state))]
pub async fn get_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL ORDER BY name"
    ))
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

// GET /products/{id} - Get single product
#[instrument(skip(state), fields(id))]
pub async fn get_product(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(&id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(Json(ProductResponse::from(product)))
}

// POST /products - Create new product
#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    if payload.sku.trim().is_empty() {
        return Err(AppError::validation("Product SKU is required"));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Product name is required"));
    }
    if payload.unit_price < 0.0 || payload.cost_price.unwrap_or(0.0) < 0.0 {
        return Err(AppError::validation("Prices cannot be negative"));
    }

    let now = Utc::now();
    let product = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (id, sku, name, category_id, brand_id, unit_price, cost_price, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(payload.sku.trim())
    .bind(payload.name.trim())
    .bind(&payload.category_id)
    .bind(&payload.brand_id)
    .bind(payload.unit_price)
    .bind(payload.cost_price.unwrap_or(0.0))
    .bind(now)
    .bind(now)
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_unique_violation(e, "Product SKU already exists"))?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

// PUT /products/{id} - Update product
#[instrument(skip(state, payload), fields(id))]
pub async fn update_product(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    if payload.unit_price.is_some_and(|p| p < 0.0) || payload.cost_price.is_some_and(|p| p < 0.0) {
        return Err(AppError::validation("Prices cannot be negative"));
    }

    let product = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET
            sku = COALESCE(?, sku),
            name = COALESCE(?, name),
            category_id = COALESCE(?, category_id),
            brand_id = COALESCE(?, brand_id),
            unit_price = COALESCE(?, unit_price),
            cost_price = COALESCE(?, cost_price),
            updated_at = ?
         WHERE id = ? AND deleted_at IS NULL
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(payload.sku.as_deref().map(str::trim))
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.category_id)
    .bind(&payload.brand_id)
    .bind(payload.unit_price)
    .bind(payload.cost_price)
    .bind(Utc::now())
    .bind(&id)
    .fetch_optional(&state.db_pool)
    .await
    .map_err(|e| map_unique_violation(e, "Product SKU already exists"))?
    .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(Json(ProductResponse::from(product)))
}

// DELETE /products/{id} - Soft-delete product
#[instrument(skip(state), fields(id))]
pub async fn delete_product(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let holds_stock: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM inventory_levels WHERE product_id = ? AND quantity_on_hand != 0)",
    )
    .bind(&id)
    .fetch_one(&state.db_pool)
    .await?;

    if holds_stock {
        return Err(AppError::conflict(
            "Cannot delete a product that still holds stock",
        ));
    }

    let result = sqlx::query(
        "UPDATE products SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(&id)
    .execute(&state.db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Product not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
