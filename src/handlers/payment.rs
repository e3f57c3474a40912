// src/handlers/payment.rs
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::payment::{CreatePaymentRequest, PaymentResponse};
use crate::error::AppError;
use crate::state::AppState;

pub(crate) async fn create_payment_inner(
    pool: &SqlitePool,
    req: CreatePaymentRequest,
) -> Result<PaymentResponse, AppError> {
    if req.amount <= 0.0 {
        return Err(AppError::validation("Payment amount must be greater than 0"));
    }

    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, String>("SELECT id FROM customers WHERE id = ? AND deleted_at IS NULL")
        .bind(&req.customer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Customer not found"))?;

    let id = Uuid::new_v4().to_string();
    let method = req.method.unwrap_or_else(|| "cash".to_string());
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO payments (id, customer_id, amount, method, note, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.customer_id)
    .bind(req.amount)
    .bind(&method)
    .bind(&req.note)
    .bind(created_at)
    .execute(&mut *tx)
    .await?;

    // A payment settles debt: the balance moves down by the paid amount.
    let new_balance: f64 = sqlx::query_scalar(
        "UPDATE customers SET current_balance = current_balance - ?, updated_at = ?
         WHERE id = ?
         RETURNING current_balance",
    )
    .bind(req.amount)
    .bind(Utc::now())
    .bind(&req.customer_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(PaymentResponse {
        id,
        customer_id: req.customer_id,
        amount: req.amount,
        method,
        note: req.note,
        created_at,
        new_balance,
    })
}

// POST /payments - Record a customer payment
#[instrument(skip(state, req))]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let payment = create_payment_inner(&state.db_pool, req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

// GET /payments - List payments, optionally filtered by customer
#[instrument(skip(state))]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let customer_id = params.get("customer_id");

    let mut query_str = String::from(
        "SELECT p.id, p.customer_id, p.amount, p.method, p.note, p.created_at,
                c.current_balance AS new_balance
         FROM payments p
         JOIN customers c ON p.customer_id = c.id
         WHERE 1=1",
    );
    if customer_id.is_some() {
        query_str.push_str(" AND p.customer_id = ?");
    }
    query_str.push_str(" ORDER BY p.created_at DESC");

    let mut query = sqlx::query_as::<
        _,
        (String, String, f64, String, Option<String>, DateTime<Utc>, f64),
    >(&query_str);
    if let Some(cid) = customer_id {
        query = query.bind(cid);
    }

    let payments = query.fetch_all(&state.db_pool).await?;

    Ok(Json(
        payments
            .into_iter()
            .map(
                |(id, customer_id, amount, method, note, created_at, new_balance)| {
                    PaymentResponse {
                        id,
                        customer_id,
                        amount,
                        method,
                        note,
                        created_at,
                        new_balance,
                    }
                },
            )
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::*;

    #[tokio::test]
    async fn payment_decrements_customer_balance() {
        let pool = test_pool().await;
        let customer = seed_customer(&pool, "Corner cafe", 25.0).await;

        let payment = create_payment_inner(
            &pool,
            CreatePaymentRequest {
                customer_id: customer.clone(),
                amount: 10.0,
                method: None,
                note: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(payment.new_balance, 15.0);
        assert_eq!(payment.method, "cash");
        assert_eq!(customer_balance(&pool, &customer).await, 15.0);
    }

    #[tokio::test]
    async fn payment_rejects_non_positive_amounts() {
        let pool = test_pool().await;
        let customer = seed_customer(&pool, "Corner cafe", 25.0).await;

        let err = create_payment_inner(
            &pool,
            CreatePaymentRequest {
                customer_id: customer.clone(),
                amount: 0.0,
                method: None,
                note: None,
            },
        )
        .await;
        assert!(matches!(err, Err(AppError::ValidationError(_))));
        assert_eq!(customer_balance(&pool, &customer).await, 25.0);
    }

    #[tokio::test]
    async fn payment_for_unknown_customer_fails() {
        let pool = test_pool().await;

        let err = create_payment_inner(
            &pool,
            CreatePaymentRequest {
                customer_id: "no-such-customer".to_string(),
                amount: 5.0,
                method: None,
                note: None,
            },
        )
        .await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }
}
