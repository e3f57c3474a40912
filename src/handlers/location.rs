// src/handlers/location.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::location::{CreateLocationRequest, LocationResponse, UpdateLocationRequest};
use crate::error::{map_unique_violation, AppError};
use crate::models::location::Location;
use crate::state::AppState;

// GET /locations - List all locations
#[instrument(skip(state))]
pub async fn get_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationResponse>>, AppError> {
    let locations = sqlx::query_as::<_, Location>(
        "SELECT id, name, address, created_at, updated_at
         FROM locations WHERE deleted_at IS NULL ORDER BY name",
    )
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(locations.into_iter().map(LocationResponse::from).collect()))
}

// POST /locations - Create new location
#[instrument(skip(state, payload))]
pub async fn create_location(
    State(state): State<AppState>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<LocationResponse>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Location name is required"));
    }

    let now = Utc::now();
    let location = sqlx::query_as::<_, Location>(
        "INSERT INTO locations (id, name, address, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id, name, address, created_at, updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payload.name.trim())
    .bind(&payload.address)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_unique_violation(e, "Location name already exists"))?;

    Ok((StatusCode::CREATED, Json(LocationResponse::from(location))))
}

// PUT /locations/{id} - Update location
#[instrument(skip(state, payload), fields(id))]
pub async fn update_location(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<LocationResponse>, AppError> {
    let location = sqlx::query_as::<_, Location>(
        "UPDATE locations SET
            name = COALESCE(?, name),
            address = COALESCE(?, address),
            updated_at = ?
         WHERE id = ? AND deleted_at IS NULL
         RETURNING id, name, address, created_at, updated_at",
    )
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.address)
    .bind(Utc::now())
    .bind(&id)
    .fetch_optional(&state.db_pool)
    .await
    .map_err(|e| map_unique_violation(e, "Location name already exists"))?
    .ok_or_else(|| AppError::not_found("Location not found"))?;

    Ok(Json(LocationResponse::from(location)))
}

// DELETE /locations/{id} - Soft-delete location
#[instrument(skip(state), fields(id))]
pub async fn delete_location(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let holds_stock: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM inventory_levels WHERE location_id = ? AND quantity_on_hand != 0)",
    )
    .bind(&id)
    .fetch_one(&state.db_pool)
    .await?;

    if holds_stock {
        return Err(AppError::conflict(
            "Cannot delete a location that still holds stock",
        ));
    }

    let result = sqlx::query(
        "UPDATE locations SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(&id)
    .execute(&state.db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Location not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
