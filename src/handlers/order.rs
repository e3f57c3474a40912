// src/handlers/order.rs
//
// Orders earmark stock without moving it: placing one bumps
// `quantity_reserved`, cancelling releases it, and checkout releases it and
// hands the lines to the sale builder in the same transaction.
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::order::{
    CreateOrderRequest, OrderItemResponse, OrderListItem, OrderResponse,
};
use crate::dtos::sale::SaleResponse;
use crate::error::AppError;
use crate::handlers::sale::{fetch_sale_by_id, post_sale, PricedLine};
use crate::ledger::StockPolicy;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

async fn reserve_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
    quantity: i64,
    policy: StockPolicy,
) -> Result<(), AppError> {
    let level = sqlx::query_as::<_, (String, i64, i64)>(
        "SELECT id, quantity_on_hand, quantity_reserved
         FROM inventory_levels WHERE product_id = ? AND location_id = ?",
    )
    .bind(product_id)
    .bind(location_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        AppError::not_found(format!(
            "Product {product_id} is not stocked at this location"
        ))
    })?;

    let (level_id, on_hand, reserved) = level;
    let available = on_hand - reserved;
    if policy == StockPolicy::Strict && available < quantity {
        return Err(AppError::validation(format!(
            "Insufficient stock to reserve. Available: {available}, Requested: {quantity}"
        )));
    }

    sqlx::query(
        "UPDATE inventory_levels SET quantity_reserved = quantity_reserved + ?, updated_at = ? WHERE id = ?",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(&level_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn release_reservations(
    conn: &mut SqliteConnection,
    order_id: &str,
    location_id: &str,
) -> Result<(), AppError> {
    let items = sqlx::query_as::<_, (String, i64)>(
        "SELECT product_id, quantity FROM order_items WHERE order_id = ?",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    for (product_id, quantity) in items {
        sqlx::query(
            "UPDATE inventory_levels SET quantity_reserved = quantity_reserved - ?, updated_at = ?
             WHERE product_id = ? AND location_id = ?",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(&product_id)
        .bind(location_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub(crate) async fn create_order_inner(
    pool: &SqlitePool,
    policy: StockPolicy,
    req: CreateOrderRequest,
) -> Result<OrderResponse, AppError> {
    if req.items.is_empty() {
        return Err(AppError::validation("Order must contain at least one item"));
    }

    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, String>("SELECT id FROM locations WHERE id = ? AND deleted_at IS NULL")
        .bind(&req.location_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Location not found"))?;

    if let Some(customer_id) = &req.customer_id {
        sqlx::query_scalar::<_, String>(
            "SELECT id FROM customers WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Customer not found"))?;
    }

    let order_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO orders (id, customer_id, location_id, status, note, created_at, updated_at)
         VALUES (?, ?, ?, 'pending', ?, ?, ?)",
    )
    .bind(&order_id)
    .bind(&req.customer_id)
    .bind(&req.location_id)
    .bind(&req.note)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for item in &req.items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Quantity must be greater than 0"));
        }

        let list_price: f64 = sqlx::query_scalar(
            "SELECT unit_price FROM products WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&item.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {} not found", item.product_id)))?;

        let unit_price = item.unit_price.unwrap_or(list_price);
        if unit_price < 0.0 {
            return Err(AppError::validation("Unit price cannot be negative"));
        }

        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&order_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(unit_price)
        .execute(&mut *tx)
        .await?;

        reserve_stock(&mut tx, &item.product_id, &req.location_id, item.quantity, policy).await?;
    }

    tx.commit().await?;

    fetch_order_by_id(pool, &order_id).await
}

// POST /orders - Place an order (reserves stock)
#[instrument(skip(state, req))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let order = create_order_inner(&state.db_pool, state.stock_policy, req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

// GET /orders/{id}
#[instrument(skip(state), fields(id))]
pub async fn get_order(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OrderResponse>, AppError> {
    fetch_order_by_id(&state.db_pool, &id).await.map(Json)
}

// GET /orders - List orders, optionally filtered by status
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<OrderListItem>>, AppError> {
    let status = params
        .get("status")
        .map(|raw| parse_status(raw))
        .transpose()?;

    let mut query_str = String::from(
        "SELECT o.id, c.name AS customer_name, o.status,
                COUNT(oi.id) AS total_lines, o.created_at
         FROM orders o
         LEFT JOIN customers c ON o.customer_id = c.id
         LEFT JOIN order_items oi ON oi.order_id = o.id
         WHERE 1=1",
    );
    if status.is_some() {
        query_str.push_str(" AND o.status = ?");
    }
    query_str.push_str(" GROUP BY o.id, c.name, o.status, o.created_at ORDER BY o.created_at DESC");

    let mut query =
        sqlx::query_as::<_, (String, Option<String>, OrderStatus, i64, DateTime<Utc>)>(&query_str);
    if let Some(status) = status {
        query = query.bind(status);
    }

    let orders = query.fetch_all(&state.db_pool).await?;

    Ok(Json(
        orders
            .into_iter()
            .map(|(id, customer_name, status, total_lines, created_at)| OrderListItem {
                id,
                customer_name,
                status,
                total_lines,
                created_at,
            })
            .collect(),
    ))
}

pub(crate) async fn cancel_order_inner(
    pool: &SqlitePool,
    id: &str,
) -> Result<OrderResponse, AppError> {
    let mut tx = pool.begin().await?;

    let order = fetch_order_for_update(&mut tx, id).await?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::conflict("Only pending orders can be cancelled"));
    }

    release_reservations(&mut tx, id, &order.location_id).await?;

    sqlx::query("UPDATE orders SET status = 'cancelled', updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    fetch_order_by_id(pool, id).await
}

// POST /orders/{id}/cancel - Release the reservation
#[instrument(skip(state), fields(id))]
pub async fn cancel_order(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OrderResponse>, AppError> {
    cancel_order_inner(&state.db_pool, &id).await.map(Json)
}

pub(crate) async fn checkout_order_inner(
    pool: &SqlitePool,
    policy: StockPolicy,
    id: &str,
) -> Result<SaleResponse, AppError> {
    let mut tx = pool.begin().await?;

    let order = fetch_order_for_update(&mut tx, id).await?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::conflict("Only pending orders can be checked out"));
    }

    let items = sqlx::query_as::<_, (String, i64, f64)>(
        "SELECT product_id, quantity, unit_price FROM order_items WHERE order_id = ?",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let lines: Vec<PricedLine> = items
        .into_iter()
        .map(|(product_id, quantity, unit_price)| PricedLine {
            product_id,
            quantity,
            unit_price,
            line_total: quantity as f64 * unit_price,
        })
        .collect();

    // Release first so the sale's sufficiency check sees the order's own
    // units as available again.
    release_reservations(&mut tx, id, &order.location_id).await?;

    let transaction_id = post_sale(
        &mut tx,
        policy,
        order.customer_id.as_deref(),
        &order.location_id,
        order.note.as_deref(),
        &lines,
    )
    .await?;

    sqlx::query("UPDATE orders SET status = 'fulfilled', updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    fetch_sale_by_id(pool, &transaction_id).await
}

// POST /orders/{id}/checkout - Convert the reservation into a sale
#[instrument(skip(state), fields(id))]
pub async fn checkout_order(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SaleResponse>), AppError> {
    let sale = checkout_order_inner(&state.db_pool, state.stock_policy, &id).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn fetch_order_for_update(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>(
        "SELECT id, customer_id, location_id, status, note, created_at, updated_at
         FROM orders WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Order not found"))
}

async fn fetch_order_by_id(pool: &SqlitePool, id: &str) -> Result<OrderResponse, AppError> {
    let header = sqlx::query_as::<_, (String, Option<String>, Option<String>, String, OrderStatus, Option<String>, DateTime<Utc>)>(
        "SELECT o.id, o.customer_id, c.name AS customer_name, o.location_id, o.status, o.note, o.created_at
         FROM orders o
         LEFT JOIN customers c ON o.customer_id = c.id
         WHERE o.id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Order not found"))?;

    let items = sqlx::query_as::<_, (String, String, String, i64, f64)>(
        "SELECT oi.id, oi.product_id, p.name AS product_name, oi.quantity, oi.unit_price
         FROM order_items oi
         JOIN products p ON oi.product_id = p.id
         WHERE oi.order_id = ?
         ORDER BY p.name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(OrderResponse {
        id: header.0,
        customer_id: header.1,
        customer_name: header.2,
        location_id: header.3,
        status: header.4,
        note: header.5,
        created_at: header.6,
        items: items
            .into_iter()
            .map(|(id, product_id, product_name, quantity, unit_price)| OrderItemResponse {
                id,
                product_id,
                product_name,
                quantity,
                unit_price,
            })
            .collect(),
    })
}

fn parse_status(raw: &str) -> Result<OrderStatus, AppError> {
    match raw {
        "pending" => Ok(OrderStatus::Pending),
        "fulfilled" => Ok(OrderStatus::Fulfilled),
        "cancelled" => Ok(OrderStatus::Cancelled),
        _ => Err(AppError::validation(
            "status must be one of 'pending', 'fulfilled', 'cancelled'",
        )),
    }
}
