// src/handlers/catalog.rs
//
// Categories and brands are identical lookup tables; the handlers share one
// implementation parameterized by table name (a compile-time constant, never
// caller input).
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::catalog::{
    CatalogEntryResponse, CreateCatalogEntryRequest, UpdateCatalogEntryRequest,
};
use crate::error::{map_unique_violation, AppError};
use crate::models::catalog::CatalogEntry;
use crate::state::AppState;

struct CatalogTable {
    table: &'static str,
    label: &'static str,
}

const CATEGORIES: CatalogTable = CatalogTable {
    table: "categories",
    label: "Category",
};
const BRANDS: CatalogTable = CatalogTable {
    table: "brands",
    label: "Brand",
};

async fn list_entries(
    state: &AppState,
    t: &CatalogTable,
) -> Result<Json<Vec<CatalogEntryResponse>>, AppError> {
    let entries = sqlx::query_as::<_, CatalogEntry>(&format!(
        "SELECT id, name, created_at, updated_at FROM {} WHERE deleted_at IS NULL ORDER BY name",
        t.table
    ))
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(entries.into_iter().map(CatalogEntryResponse::from).collect()))
}

async fn create_entry(
    state: &AppState,
    t: &CatalogTable,
    payload: CreateCatalogEntryRequest,
) -> Result<(StatusCode, Json<CatalogEntryResponse>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation(format!("{} name is required", t.label)));
    }

    let now = Utc::now();
    let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
        "INSERT INTO {} (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)
         RETURNING id, name, created_at, updated_at",
        t.table
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(payload.name.trim())
    .bind(now)
    .bind(now)
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_unique_violation(e, &format!("{} name already exists", t.label)))?;

    Ok((StatusCode::CREATED, Json(CatalogEntryResponse::from(entry))))
}

async fn update_entry(
    state: &AppState,
    t: &CatalogTable,
    id: String,
    payload: UpdateCatalogEntryRequest,
) -> Result<Json<CatalogEntryResponse>, AppError> {
    let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
        "UPDATE {} SET name = COALESCE(?, name), updated_at = ?
         WHERE id = ? AND deleted_at IS NULL
         RETURNING id, name, created_at, updated_at",
        t.table
    ))
    .bind(payload.name.as_deref().map(str::trim))
    .bind(Utc::now())
    .bind(&id)
    .fetch_optional(&state.db_pool)
    .await
    .map_err(|e| map_unique_violation(e, &format!("{} name already exists", t.label)))?
    .ok_or_else(|| AppError::not_found(format!("{} not found", t.label)))?;

    Ok(Json(CatalogEntryResponse::from(entry)))
}

async fn delete_entry(state: &AppState, t: &CatalogTable, id: String) -> Result<StatusCode, AppError> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        t.table
    ))
    .bind(Utc::now())
    .bind(Utc::now())
    .bind(&id)
    .execute(&state.db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("{} not found", t.label)));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ==================== Categories ====================

#[instrument(skip(state))]
pub async fn get_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntryResponse>>, AppError> {
    list_entries(&state, &CATEGORIES).await
}

#[instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<CatalogEntryResponse>), AppError> {
    create_entry(&state, &CATEGORIES, payload).await
}

#[instrument(skip(state, payload), fields(id))]
pub async fn update_category(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCatalogEntryRequest>,
) -> Result<Json<CatalogEntryResponse>, AppError> {
    update_entry(&state, &CATEGORIES, id, payload).await
}

#[instrument(skip(state), fields(id))]
pub async fn delete_category(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    delete_entry(&state, &CATEGORIES, id).await
}

// ==================== Brands ====================

#[instrument(skip(state))]
pub async fn get_brands(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntryResponse>>, AppError> {
    list_entries(&state, &BRANDS).await
}

#[instrument(skip(state, payload))]
pub async fn create_brand(
    State(state): State<AppState>,
    Json(payload): Json<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<CatalogEntryResponse>), AppError> {
    create_entry(&state, &BRANDS, payload).await
}

#[instrument(skip(state, payload), fields(id))]
pub async fn update_brand(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCatalogEntryRequest>,
) -> Result<Json<CatalogEntryResponse>, AppError> {
    update_entry(&state, &BRANDS, id, payload).await
}

#[instrument(skip(state), fields(id))]
pub async fn delete_brand(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    delete_entry(&state, &BRANDS, id).await
}
