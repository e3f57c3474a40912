// src/handlers/inventory.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::inventory::{
    CreateInventoryLevelRequest, InventoryLevelResponse, LevelMovementResponse,
};
use crate::error::{map_unique_violation, AppError};
use crate::ledger;
use crate::models::inventory::{InventoryMovement, StockStatus};
use crate::state::AppState;

#[derive(sqlx::FromRow)]
struct LevelWithNames {
    id: String,
    product_id: String,
    product_name: String,
    location_id: String,
    location_name: String,
    quantity_on_hand: i64,
    quantity_reserved: i64,
    stock_status: StockStatus,
    batch_number: Option<String>,
    serial_number: Option<String>,
    expiry_date: Option<NaiveDate>,
    bin_location: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<LevelWithNames> for InventoryLevelResponse {
    fn from(row: LevelWithNames) -> Self {
        let available = row.quantity_on_hand - row.quantity_reserved;
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            location_id: row.location_id,
            location_name: row.location_name,
            quantity_on_hand: row.quantity_on_hand,
            quantity_reserved: row.quantity_reserved,
            available,
            stock_status: row.stock_status,
            batch_number: row.batch_number,
            serial_number: row.serial_number,
            expiry_date: row.expiry_date,
            bin_location: row.bin_location,
            updated_at: row.updated_at,
        }
    }
}

const LEVEL_SELECT: &str = "SELECT
        il.id, il.product_id, p.name AS product_name,
        il.location_id, l.name AS location_name,
        il.quantity_on_hand, il.quantity_reserved, il.stock_status,
        il.batch_number, il.serial_number, il.expiry_date, il.bin_location,
        il.updated_at
    FROM inventory_levels il
    JOIN products p ON il.product_id = p.id
    JOIN locations l ON il.location_id = l.id";

// POST /inventory/levels - Register a product at a location.
// A non-zero opening quantity goes through the ledger so the level starts
// with its matching movement row.
#[instrument(skip(state, req))]
pub async fn create_level(
    State(state): State<AppState>,
    Json(req): Json<CreateInventoryLevelRequest>,
) -> Result<(StatusCode, Json<InventoryLevelResponse>), AppError> {
    let opening_quantity = req.quantity_on_hand.unwrap_or(0);
    if opening_quantity < 0 {
        return Err(AppError::validation("Opening quantity cannot be negative"));
    }

    let mut tx = state.db_pool.begin().await?;

    sqlx::query_scalar::<_, String>("SELECT id FROM products WHERE id = ? AND deleted_at IS NULL")
        .bind(&req.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    sqlx::query_scalar::<_, String>("SELECT id FROM locations WHERE id = ? AND deleted_at IS NULL")
        .bind(&req.location_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Location not found"))?;

    let level_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO inventory_levels
            (id, product_id, location_id, quantity_on_hand, quantity_reserved,
             stock_status, batch_number, serial_number, expiry_date, bin_location,
             created_at, updated_at)
         VALUES (?, ?, ?, 0, 0, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&level_id)
    .bind(&req.product_id)
    .bind(&req.location_id)
    .bind(req.stock_status.unwrap_or(StockStatus::Sellable))
    .bind(&req.batch_number)
    .bind(&req.serial_number)
    .bind(req.expiry_date)
    .bind(&req.bin_location)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        map_unique_violation(e, "Inventory level already exists for this product and location")
    })?;

    if opening_quantity > 0 {
        ledger::adjust(
            &mut tx,
            &req.product_id,
            &req.location_id,
            opening_quantity,
            Some("initial stock"),
        )
        .await?;
    }

    tx.commit().await?;

    let level = fetch_level_by_id(&state, &level_id).await?;
    Ok((StatusCode::CREATED, Json(level)))
}

// GET /inventory/levels - List levels, optionally filtered by product/location
#[instrument(skip(state))]
pub async fn list_levels(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<InventoryLevelResponse>>, AppError> {
    let product_id = params.get("product_id");
    let location_id = params.get("location_id");

    let mut query_str = format!("{LEVEL_SELECT} WHERE 1=1");
    if product_id.is_some() {
        query_str.push_str(" AND il.product_id = ?");
    }
    if location_id.is_some() {
        query_str.push_str(" AND il.location_id = ?");
    }
    query_str.push_str(" ORDER BY p.name, l.name");

    let mut query = sqlx::query_as::<_, LevelWithNames>(&query_str);
    if let Some(pid) = product_id {
        query = query.bind(pid);
    }
    if let Some(lid) = location_id {
        query = query.bind(lid);
    }

    let levels = query.fetch_all(&state.db_pool).await?;
    Ok(Json(levels.into_iter().map(InventoryLevelResponse::from).collect()))
}

// GET /inventory/levels/{id}
#[instrument(skip(state), fields(id))]
pub async fn get_level(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<InventoryLevelResponse>, AppError> {
    let level = fetch_level_by_id(&state, &id).await?;
    Ok(Json(level))
}

// GET /inventory/levels/{id}/movements - Ledger history for one level
#[instrument(skip(state), fields(id))]
pub async fn list_level_movements(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LevelMovementResponse>>, AppError> {
    let level = sqlx::query_as::<_, (String, String)>(
        "SELECT product_id, location_id FROM inventory_levels WHERE id = ?",
    )
    .bind(&id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Inventory level not found"))?;

    let movements = sqlx::query_as::<_, InventoryMovement>(
        "SELECT id, product_id, location_id, movement_type, quantity_change,
                unit_price_snapshot, reason, transaction_id, customer_id, transfer_id, created_at
         FROM inventory_movements
         WHERE product_id = ? AND location_id = ?
         ORDER BY created_at DESC",
    )
    .bind(&level.0)
    .bind(&level.1)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(
        movements.into_iter().map(LevelMovementResponse::from).collect(),
    ))
}

async fn fetch_level_by_id(
    state: &AppState,
    id: &str,
) -> Result<InventoryLevelResponse, AppError> {
    let level = sqlx::query_as::<_, LevelWithNames>(&format!("{LEVEL_SELECT} WHERE il.id = ?"))
        .bind(id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory level not found"))?;

    Ok(InventoryLevelResponse::from(level))
}
