// src/handlers/sale.rs
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

use crate::dtos::sale::{
    CreateSaleRequest, SaleItemResponse, SaleLineRequest, SaleListItem, SaleResponse, SaleSummary,
};
use crate::error::AppError;
use crate::ledger::{self, StockPolicy};
use crate::models::transaction::TransactionKind;
use crate::state::AppState;

/// A cart line with its price resolved and the product verified to exist.
pub(crate) struct PricedLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub line_total: f64,
}

/// Resolve each requested line against the catalog: the product must exist
/// and not be soft-deleted, and a missing unit price falls back to the
/// product's list price.
pub(crate) async fn resolve_lines(
    conn: &mut SqliteConnection,
    items: &[SaleLineRequest],
) -> Result<Vec<PricedLine>, AppError> {
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::validation("Quantity must be greater than 0"));
        }

        let list_price: f64 = sqlx::query_scalar(
            "SELECT unit_price FROM products WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&item.product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {} not found", item.product_id)))?;

        let unit_price = item.unit_price.unwrap_or(list_price);
        if unit_price < 0.0 {
            return Err(AppError::validation("Unit price cannot be negative"));
        }

        lines.push(PricedLine {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price,
            line_total: item.quantity as f64 * unit_price,
        });
    }

    Ok(lines)
}

/// Post a sale inside the caller's transaction: one header row, one item row
/// and one `out` ledger line per cart line, and the customer balance posting
/// for credit sales. Everything lands together or not at all.
pub(crate) async fn post_sale(
    conn: &mut SqliteConnection,
    policy: StockPolicy,
    customer_id: Option<&str>,
    location_id: &str,
    note: Option<&str>,
    lines: &[PricedLine],
) -> Result<String, AppError> {
    let total_amount: f64 = lines.iter().map(|l| l.line_total).sum();
    let transaction_id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO transactions (id, kind, customer_id, total_amount, note, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&transaction_id)
    .bind(TransactionKind::Sale)
    .bind(customer_id)
    .bind(total_amount)
    .bind(note)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    for line in lines {
        sqlx::query(
            "INSERT INTO transaction_items (id, transaction_id, product_id, quantity, unit_price, line_total)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&transaction_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .execute(&mut *conn)
        .await?;

        ledger::apply_line(
            conn,
            &line.product_id,
            location_id,
            -line.quantity,
            line.unit_price,
            &transaction_id,
            customer_id,
            policy,
        )
        .await?;
    }

    // Store-as-debt: a credit sale increases what the customer owes.
    if let Some(customer_id) = customer_id {
        sqlx::query(
            "UPDATE customers SET current_balance = current_balance + ?, updated_at = ? WHERE id = ?",
        )
        .bind(total_amount)
        .bind(Utc::now())
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(transaction_id)
}

pub(crate) async fn create_sale_inner(
    pool: &SqlitePool,
    policy: StockPolicy,
    req: CreateSaleRequest,
) -> Result<SaleResponse, AppError> {
    if req.items.is_empty() {
        return Err(AppError::validation("Sale must contain at least one item"));
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

    let lines = resolve_lines(&mut tx, &req.items).await?;
    let transaction_id = post_sale(
        &mut tx,
        policy,
        req.customer_id.as_deref(),
        &req.location_id,
        req.note.as_deref(),
        &lines,
    )
    .await?;

    tx.commit().await?;

    fetch_sale_by_id(pool, &transaction_id).await
}

// POST /sales - Complete a sale
#[instrument(skip(state, req))]
pub async fn create_sale(
    State(state): State<AppState>,
    Json(req): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), AppError> {
    let sale = create_sale_inner(&state.db_pool, state.stock_policy, req).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

// GET /sales/{id}
#[instrument(skip(state), fields(id))]
pub async fn get_sale(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SaleResponse>, AppError> {
    fetch_sale_by_id(&state.db_pool, &id).await.map(Json)
}

// GET /sales - List sales, optionally filtered by customer
#[instrument(skip(state))]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<SaleListItem>>, AppError> {
    let customer_id = params.get("customer_id");

    let mut query_str = String::from(
        "SELECT t.id, c.name AS customer_name, t.total_amount,
                COUNT(ti.id) AS total_lines, t.created_at
         FROM transactions t
         LEFT JOIN customers c ON t.customer_id = c.id
         LEFT JOIN transaction_items ti ON ti.transaction_id = t.id
         WHERE t.kind = 'sale'",
    );
    if customer_id.is_some() {
        query_str.push_str(" AND t.customer_id = ?");
    }
    query_str.push_str(" GROUP BY t.id, c.name, t.total_amount, t.created_at ORDER BY t.created_at DESC");

    let mut query = sqlx::query_as::<_, (String, Option<String>, f64, i64, DateTime<Utc>)>(&query_str);
    if let Some(cid) = customer_id {
        query = query.bind(cid);
    }

    let sales = query.fetch_all(&state.db_pool).await?;

    Ok(Json(
        sales
            .into_iter()
            .map(|(id, customer_name, total_amount, total_lines, created_at)| SaleListItem {
                id,
                customer_name,
                total_amount,
                total_lines,
                created_at,
            })
            .collect(),
    ))
}

// Helper to fetch full sale details
pub(crate) async fn fetch_sale_by_id(pool: &SqlitePool, id: &str) -> Result<SaleResponse, AppError> {
    let header = sqlx::query_as::<_, (String, Option<String>, Option<String>, f64, Option<String>, DateTime<Utc>)>(
        "SELECT t.id, t.customer_id, c.name AS customer_name, t.total_amount, t.note, t.created_at
         FROM transactions t
         LEFT JOIN customers c ON t.customer_id = c.id
         WHERE t.id = ? AND t.kind = 'sale'",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Sale not found"))?;

    let (id, customer_id, customer_name, total_amount, note, created_at) = header;

    let items = sqlx::query_as::<_, (String, String, String, i64, f64, f64)>(
        "SELECT ti.id, ti.product_id, p.name AS product_name, ti.quantity, ti.unit_price, ti.line_total
         FROM transaction_items ti
         JOIN products p ON ti.product_id = p.id
         WHERE ti.transaction_id = ?
         ORDER BY p.name",
    )
    .bind(&id)
    .fetch_all(pool)
    .await?;

    let total_quantity: i64 = items.iter().map(|i| i.3).sum();
    let balance_posted = if customer_id.is_some() { total_amount } else { 0.0 };

    let items = items
        .into_iter()
        .map(|(id, product_id, product_name, quantity, unit_price, line_total)| SaleItemResponse {
            id,
            product_id,
            product_name,
            quantity,
            unit_price,
            line_total,
        })
        .collect::<Vec<_>>();

    Ok(SaleResponse {
        id,
        customer_id,
        customer_name,
        total_amount,
        note,
        created_at,
        summary: SaleSummary {
            total_lines: items.len() as i64,
            total_quantity,
            balance_posted,
        },
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::*;

    fn line(product_id: &str, quantity: i64, unit_price: Option<f64>) -> SaleLineRequest {
        SaleLineRequest {
            product_id: product_id.to_string(),
            quantity,
            unit_price,
        }
    }

    #[tokio::test]
    async fn completed_sale_updates_stock_and_customer_balance() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let location = seed_location(&pool, "Main store").await;
        let customer = seed_customer(&pool, "Corner cafe", 1.0).await;
        seed_level(&pool, &product, &location, 10, 0).await;

        let sale = create_sale_inner(
            &pool,
            StockPolicy::Strict,
            CreateSaleRequest {
                customer_id: Some(customer.clone()),
                location_id: location.clone(),
                note: None,
                items: vec![line(&product, 4, None)],
            },
        )
        .await
        .unwrap();

        assert_eq!(sale.total_amount, 10.0);
        assert_eq!(sale.summary.total_quantity, 4);
        assert_eq!(sale.summary.balance_posted, 10.0);
        assert_eq!(on_hand(&pool, &product, &location).await, 6);
        assert_eq!(customer_balance(&pool, &customer).await, 11.0);

        let (movement_type, delta, txn_id, snapshot): (String, i64, Option<String>, Option<f64>) =
            sqlx::query_as(
                "SELECT movement_type, quantity_change, transaction_id, unit_price_snapshot
                 FROM inventory_movements WHERE product_id = ?",
            )
            .bind(&product)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(movement_type, "out");
        assert_eq!(delta, -4);
        assert_eq!(txn_id.as_deref(), Some(sale.id.as_str()));
        assert_eq!(snapshot, Some(2.50));
    }

    #[tokio::test]
    async fn multi_line_sale_decrements_each_product() {
        let pool = test_pool().await;
        let milk = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let cheese = seed_product(&pool, "SKU-002", "Cheddar 200g", 4.0).await;
        let location = seed_location(&pool, "Main store").await;
        let customer = seed_customer(&pool, "Corner cafe", 0.0).await;
        seed_level(&pool, &milk, &location, 10, 0).await;
        seed_level(&pool, &cheese, &location, 5, 0).await;

        let sale = create_sale_inner(
            &pool,
            StockPolicy::Strict,
            CreateSaleRequest {
                customer_id: Some(customer.clone()),
                location_id: location.clone(),
                note: None,
                items: vec![line(&milk, 3, None), line(&cheese, 2, None)],
            },
        )
        .await
        .unwrap();

        // 3 * 2.50 + 2 * 4.00
        assert_eq!(sale.total_amount, 15.5);
        assert_eq!(sale.items.len(), 2);
        assert_eq!(on_hand(&pool, &milk, &location).await, 7);
        assert_eq!(on_hand(&pool, &cheese, &location).await, 3);
        assert_eq!(customer_balance(&pool, &customer).await, 15.5);
        assert_eq!(movement_count(&pool, &milk).await, 1);
        assert_eq!(movement_count(&pool, &cheese).await, 1);
    }

    #[tokio::test]
    async fn cash_sale_posts_no_balance() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let location = seed_location(&pool, "Main store").await;
        seed_level(&pool, &product, &location, 10, 0).await;

        let sale = create_sale_inner(
            &pool,
            StockPolicy::Strict,
            CreateSaleRequest {
                customer_id: None,
                location_id: location.clone(),
                note: None,
                items: vec![line(&product, 2, Some(3.0))],
            },
        )
        .await
        .unwrap();

        assert_eq!(sale.total_amount, 6.0);
        assert_eq!(sale.summary.balance_posted, 0.0);
        assert_eq!(on_hand(&pool, &product, &location).await, 8);
    }

    #[tokio::test]
    async fn sale_with_unknown_product_rolls_back_everything() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let location = seed_location(&pool, "Main store").await;
        let customer = seed_customer(&pool, "Corner cafe", 5.0).await;
        seed_level(&pool, &product, &location, 10, 0).await;

        let err = create_sale_inner(
            &pool,
            StockPolicy::Strict,
            CreateSaleRequest {
                customer_id: Some(customer.clone()),
                location_id: location.clone(),
                note: None,
                items: vec![line(&product, 4, None), line("no-such-product", 1, None)],
            },
        )
        .await;
        assert!(matches!(err, Err(AppError::NotFound(_))));

        // Nothing from the aborted sale is observable.
        assert_eq!(on_hand(&pool, &product, &location).await, 10);
        assert_eq!(movement_count(&pool, &product).await, 0);
        assert_eq!(customer_balance(&pool, &customer).await, 5.0);
        let headers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(headers, 0);
    }

    #[tokio::test]
    async fn sale_exceeding_available_stock_rolls_back_under_strict() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let cheese = seed_product(&pool, "SKU-002", "Cheddar 200g", 4.0).await;
        let location = seed_location(&pool, "Main store").await;
        let customer = seed_customer(&pool, "Corner cafe", 0.0).await;
        seed_level(&pool, &product, &location, 10, 0).await;
        seed_level(&pool, &cheese, &location, 1, 0).await;

        // First line would succeed on its own; the second oversells.
        let err = create_sale_inner(
            &pool,
            StockPolicy::Strict,
            CreateSaleRequest {
                customer_id: Some(customer.clone()),
                location_id: location.clone(),
                note: None,
                items: vec![line(&product, 4, None), line(&cheese, 3, None)],
            },
        )
        .await;
        assert!(matches!(err, Err(AppError::ValidationError(_))));

        assert_eq!(on_hand(&pool, &product, &location).await, 10);
        assert_eq!(on_hand(&pool, &cheese, &location).await, 1);
        assert_eq!(movement_count(&pool, &product).await, 0);
        assert_eq!(movement_count(&pool, &cheese).await, 0);
        assert_eq!(customer_balance(&pool, &customer).await, 0.0);
    }

    #[tokio::test]
    async fn sale_can_oversell_when_policy_allows() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let location = seed_location(&pool, "Main store").await;
        seed_level(&pool, &product, &location, 2, 0).await;

        create_sale_inner(
            &pool,
            StockPolicy::AllowNegative,
            CreateSaleRequest {
                customer_id: None,
                location_id: location.clone(),
                note: None,
                items: vec![line(&product, 5, None)],
            },
        )
        .await
        .unwrap();

        assert_eq!(on_hand(&pool, &product, &location).await, -3);
        assert_eq!(movement_count(&pool, &product).await, 1);
    }

    #[tokio::test]
    async fn sale_rejects_empty_cart_and_bad_quantities() {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let location = seed_location(&pool, "Main store").await;
        seed_level(&pool, &product, &location, 10, 0).await;

        let empty = create_sale_inner(
            &pool,
            StockPolicy::Strict,
            CreateSaleRequest {
                customer_id: None,
                location_id: location.clone(),
                note: None,
                items: vec![],
            },
        )
        .await;
        assert!(matches!(empty, Err(AppError::ValidationError(_))));

        let zero_quantity = create_sale_inner(
            &pool,
            StockPolicy::Strict,
            CreateSaleRequest {
                customer_id: None,
                location_id: location.clone(),
                note: None,
                items: vec![line(&product, 0, None)],
            },
        )
        .await;
        assert!(matches!(zero_quantity, Err(AppError::ValidationError(_))));
    }
}
