// src/handlers/purchase.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::purchase::{CreatePurchaseRequest, PurchaseItemResponse, PurchaseResponse};
use crate::error::AppError;
use crate::ledger;
use crate::models::transaction::{TransactionKind, TransactionRecord};
use crate::state::AppState;

pub(crate) async fn create_purchase_inner(
    pool: &SqlitePool,
    req: CreatePurchaseRequest,
) -> Result<PurchaseResponse, AppError> {
    if req.items.is_empty() {
        return Err(AppError::validation(
            "Purchase must contain at least one item",
        ));
    }

    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, String>("SELECT id FROM locations WHERE id = ? AND deleted_at IS NULL")
        .bind(&req.location_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Location not found"))?;

    let mut priced = Vec::with_capacity(req.items.len());
    for item in &req.items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Quantity must be greater than 0"));
        }

        let cost_price: f64 = sqlx::query_scalar(
            "SELECT cost_price FROM products WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&item.product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {} not found", item.product_id)))?;

        let unit_cost = item.unit_cost.unwrap_or(cost_price);
        if unit_cost < 0.0 {
            return Err(AppError::validation("Unit cost cannot be negative"));
        }

        priced.push((item.product_id.clone(), item.quantity, unit_cost));
    }

    let total_amount: f64 = priced.iter().map(|(_, q, c)| *q as f64 * c).sum();
    let transaction_id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO transactions (id, kind, customer_id, total_amount, note, created_at)
         VALUES (?, ?, NULL, ?, ?, ?)",
    )
    .bind(&transaction_id)
    .bind(TransactionKind::Purchase)
    .bind(total_amount)
    .bind(&req.note)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    for (product_id, quantity, unit_cost) in &priced {
        sqlx::query(
            "INSERT INTO transaction_items (id, transaction_id, product_id, quantity, unit_price, line_total)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&transaction_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_cost)
        .bind(*quantity as f64 * unit_cost)
        .execute(&mut *tx)
        .await?;

        // Receipts are `in` lines; the policy never blocks them and a level
        // row is created on first receipt.
        ledger::apply_line(
            &mut tx,
            product_id,
            &req.location_id,
            *quantity,
            *unit_cost,
            &transaction_id,
            None,
            ledger::StockPolicy::Strict,
        )
        .await?;
    }

    tx.commit().await?;

    fetch_purchase_by_id(pool, &transaction_id).await
}

// POST /purchases - Receive stock against a purchase
#[instrument(skip(state, req))]
pub async fn create_purchase(
    State(state): State<AppState>,
    Json(req): Json<CreatePurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let purchase = create_purchase_inner(&state.db_pool, req).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

// GET /purchases/{id}
#[instrument(skip(state), fields(id))]
pub async fn get_purchase(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PurchaseResponse>, AppError> {
    fetch_purchase_by_id(&state.db_pool, &id).await.map(Json)
}

// GET /purchases
#[instrument(skip(state))]
pub async fn list_purchases(
    State(state): State<AppState>,
) -> Result<Json<Vec<PurchaseResponse>>, AppError> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM transactions WHERE kind = 'purchase' ORDER BY created_at DESC",
    )
    .fetch_all(&state.db_pool)
    .await?;

    let mut purchases = Vec::with_capacity(ids.len());
    for id in ids {
        purchases.push(fetch_purchase_by_id(&state.db_pool, &id).await?);
    }

    Ok(Json(purchases))
}

async fn fetch_purchase_by_id(pool: &SqlitePool, id: &str) -> Result<PurchaseResponse, AppError> {
    let header = sqlx::query_as::<_, TransactionRecord>(
        "SELECT id, kind, customer_id, total_amount, note, created_at
         FROM transactions WHERE id = ? AND kind = 'purchase'",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Purchase not found"))?;

    let items = sqlx::query_as::<_, (String, String, String, i64, f64, f64)>(
        "SELECT ti.id, ti.product_id, p.name AS product_name, ti.quantity, ti.unit_price, ti.line_total
         FROM transaction_items ti
         JOIN products p ON ti.product_id = p.id
         WHERE ti.transaction_id = ?
         ORDER BY p.name",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(PurchaseResponse {
        id: header.id,
        total_amount: header.total_amount,
        note: header.note,
        created_at: header.created_at,
        items: items
            .into_iter()
            .map(|(id, product_id, product_name, quantity, unit_cost, line_total)| {
                PurchaseItemResponse {
                    id,
                    product_id,
                    product_name,
                    quantity,
                    unit_cost,
                    line_total,
                }
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::*;
    use crate::dtos::purchase::PurchaseLineRequest;

    #[tokio::test]
    async fn purchase_receives_stock_and_creates_missing_levels() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let location = seed_location(&pool, "Main store").await;

        // No level row exists yet; receiving creates it.
        let purchase = create_purchase_inner(
            &pool,
            CreatePurchaseRequest {
                location_id: location.clone(),
                note: Some("opening delivery".to_string()),
                items: vec![PurchaseLineRequest {
                    product_id: product.clone(),
                    quantity: 24,
                    unit_cost: Some(1.75),
                }],
            },
        )
        .await
        .unwrap();

        assert_eq!(purchase.total_amount, 42.0);
        assert_eq!(on_hand(&pool, &product, &location).await, 24);

        let (movement_type, delta): (String, i64) = sqlx::query_as(
            "SELECT movement_type, quantity_change FROM inventory_movements WHERE product_id = ?",
        )
        .bind(&product)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(movement_type, "in");
        assert_eq!(delta, 24);
    }

    #[tokio::test]
    async fn purchase_with_unknown_product_rolls_back() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let location = seed_location(&pool, "Main store").await;
        seed_level(&pool, &product, &location, 5, 0).await;

        let err = create_purchase_inner(
            &pool,
            CreatePurchaseRequest {
                location_id: location.clone(),
                note: None,
                items: vec![
                    PurchaseLineRequest {
                        product_id: product.clone(),
                        quantity: 10,
                        unit_cost: None,
                    },
                    PurchaseLineRequest {
                        product_id: "no-such-product".to_string(),
                        quantity: 1,
                        unit_cost: None,
                    },
                ],
            },
        )
        .await;
        assert!(matches!(err, Err(AppError::NotFound(_))));

        assert_eq!(on_hand(&pool, &product, &location).await, 5);
        assert_eq!(movement_count(&pool, &product).await, 0);
    }
}
