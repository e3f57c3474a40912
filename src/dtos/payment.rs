// src/dtos/payment.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub customer_id: String,
    pub amount: f64,
    pub method: Option<String>, // defaults to "cash"
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub customer_id: String,
    pub amount: f64,
    pub method: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub new_balance: f64,
}
