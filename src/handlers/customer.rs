// src/handlers/customer.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::customer::{CreateCustomerRequest, CustomerResponse, UpdateCustomerRequest};
use crate::error::AppError;
use crate::models::customer::Customer;
use crate::state::AppState;

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, current_balance, created_at, updated_at";

// GET /customers - List all customers
#[instrument(skip(state))]
pub async fn get_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<CustomerResponse>>, AppError> {
    let customers = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE deleted_at IS NULL ORDER BY name"
    ))
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(customers.into_iter().map(CustomerResponse::from).collect()))
}

// GET /customers/{id} - Get single customer (with current balance)
#[instrument(skip(state), fields(id))]
pub async fn get_customer(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CustomerResponse>, AppError> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(&id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Customer not found"))?;

    Ok(Json(CustomerResponse::from(customer)))
}

// POST /customers - Create new customer
#[instrument(skip(state, payload))]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }

    let now = Utc::now();
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "INSERT INTO customers (id, name, phone, email, current_balance, created_at, updated_at)
         VALUES (?, ?, ?, ?, 0, ?, ?)
         RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(payload.name.trim())
    .bind(&payload.phone)
    .bind(&payload.email)
    .bind(now)
    .bind(now)
    .fetch_one(&state.db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(CustomerResponse::from(customer))))
}

// PUT /customers/{id} - Update customer contact details.
// The balance is never set directly; it only moves through sales and payments.
#[instrument(skip(state, payload), fields(id))]
pub async fn update_customer(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<Json<CustomerResponse>, AppError> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "UPDATE customers SET
            name = COALESCE(?, name),
            phone = COALESCE(?, phone),
            email = COALESCE(?, email),
            updated_at = ?
         WHERE id = ? AND deleted_at IS NULL
         RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(payload.name.as_deref().map(str::trim))
    .bind(&payload.phone)
    .bind(&payload.email)
    .bind(Utc::now())
    .bind(&id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Customer not found"))?;

    Ok(Json(CustomerResponse::from(customer)))
}

// DELETE /customers/{id} - Soft-delete customer
#[instrument(skip(state), fields(id))]
pub async fn delete_customer(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let balance: Option<f64> =
        sqlx::query_scalar("SELECT current_balance FROM customers WHERE id = ? AND deleted_at IS NULL")
            .bind(&id)
            .fetch_optional(&state.db_pool)
            .await?;

    let balance = balance.ok_or_else(|| AppError::not_found("Customer not found"))?;
    if balance != 0.0 {
        return Err(AppError::conflict(
            "Cannot delete a customer with an outstanding balance",
        ));
    }

    sqlx::query("UPDATE customers SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(&id)
        .execute(&state.db_pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
