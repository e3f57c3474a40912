// src/handlers/stock_movement.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::instrument;

use crate::dtos::inventory::{
    AdjustStockRequest, AdjustStockResponse, MovementResponse, TransferStockRequest,
    TransferStockResponse,
};
use crate::error::AppError;
use crate::ledger;
use crate::models::inventory::MovementType;
use crate::state::AppState;

// ==================== Adjust ====================

// POST /stock-movements/adjust - Set on-hand to an observed count
#[instrument(skip(state, req))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<(StatusCode, Json<AdjustStockResponse>), AppError> {
    let mut tx = state.db_pool.begin().await?;
    let applied = ledger::adjust(
        &mut tx,
        &req.product_id,
        &req.location_id,
        req.new_quantity,
        req.reason.as_deref(),
    )
    .await?;
    tx.commit().await?;

    let response = match applied {
        Some(applied) => AdjustStockResponse {
            movement_id: Some(applied.movement_id),
            quantity_change: applied.quantity_change,
            new_on_hand: applied.new_on_hand,
        },
        // Count already matched; nothing was written.
        None => AdjustStockResponse {
            movement_id: None,
            quantity_change: 0,
            new_on_hand: req.new_quantity,
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

// ==================== Transfer ====================

// POST /stock-movements/transfer - Move stock between locations
#[instrument(skip(state, req))]
pub async fn transfer_stock(
    State(state): State<AppState>,
    Json(req): Json<TransferStockRequest>,
) -> Result<(StatusCode, Json<TransferStockResponse>), AppError> {
    let mut tx = state.db_pool.begin().await?;
    let outcome = ledger::transfer(
        &mut tx,
        &req.product_id,
        &req.from_location_id,
        &req.to_location_id,
        req.quantity,
        req.reason.as_deref(),
        state.stock_policy,
    )
    .await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(TransferStockResponse {
            transfer_id: outcome.transfer_id,
            source_on_hand: outcome.source_on_hand,
            destination_on_hand: outcome.destination_on_hand,
        }),
    ))
}

// ==================== History ====================

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: String,
    product_id: String,
    product_name: String,
    location_id: String,
    location_name: String,
    movement_type: MovementType,
    quantity_change: i64,
    unit_price_snapshot: Option<f64>,
    reason: Option<String>,
    transaction_id: Option<String>,
    customer_id: Option<String>,
    transfer_id: Option<String>,
    created_at: DateTime<Utc>,
}

// GET /stock-movements/products/{product_id} - Movement history for a product.
// Optional filters: location_id, movement_type, start_date, end_date.
#[instrument(skip(state), fields(product_id))]
pub async fn get_product_movements(
    Path(product_id): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<MovementResponse>>, AppError> {
    let location_id = params.get("location_id");
    let movement_type = params
        .get("movement_type")
        .map(|raw| parse_movement_type(raw))
        .transpose()?;
    let start_date = parse_date_param(&params, "start_date")?;
    let end_date = parse_date_param(&params, "end_date")?;

    let mut query_str = String::from(
        "SELECT
            im.id, im.product_id, p.name AS product_name,
            im.location_id, l.name AS location_name,
            im.movement_type, im.quantity_change, im.unit_price_snapshot,
            im.reason, im.transaction_id, im.customer_id, im.transfer_id,
            im.created_at
         FROM inventory_movements im
         JOIN products p ON im.product_id = p.id
         JOIN locations l ON im.location_id = l.id
         WHERE im.product_id = ?",
    );

    if location_id.is_some() {
        query_str.push_str(" AND im.location_id = ?");
    }
    if movement_type.is_some() {
        query_str.push_str(" AND im.movement_type = ?");
    }
    if start_date.is_some() {
        query_str.push_str(" AND im.created_at >= ?");
    }
    if end_date.is_some() {
        query_str.push_str(" AND im.created_at < date(?, '+1 day')");
    }
    query_str.push_str(" ORDER BY im.created_at DESC");

    let mut query = sqlx::query_as::<_, MovementRow>(&query_str).bind(&product_id);
    if let Some(lid) = location_id {
        query = query.bind(lid);
    }
    if let Some(mt) = movement_type {
        query = query.bind(mt);
    }
    if let Some(sd) = start_date {
        query = query.bind(sd.to_string());
    }
    if let Some(ed) = end_date {
        query = query.bind(ed.to_string());
    }

    let rows = query.fetch_all(&state.db_pool).await?;

    Ok(Json(
        rows.into_iter()
            .map(|m| MovementResponse {
                id: m.id,
                product_id: m.product_id,
                product_name: m.product_name,
                location_id: m.location_id,
                location_name: m.location_name,
                movement_type: m.movement_type,
                quantity_change: m.quantity_change,
                unit_price_snapshot: m.unit_price_snapshot,
                reason: m.reason,
                transaction_id: m.transaction_id,
                customer_id: m.customer_id,
                transfer_id: m.transfer_id,
                created_at: m.created_at,
            })
            .collect(),
    ))
}

fn parse_movement_type(raw: &str) -> Result<MovementType, AppError> {
    match raw {
        "in" => Ok(MovementType::In),
        "out" => Ok(MovementType::Out),
        "adjust" => Ok(MovementType::Adjust),
        _ => Err(AppError::validation(
            "movement_type must be one of 'in', 'out', 'adjust'",
        )),
    }
}

fn parse_date_param(
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Option<NaiveDate>, AppError> {
    params
        .get(key)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::validation(format!("{key} must be formatted YYYY-MM-DD")))
        })
        .transpose()
}
