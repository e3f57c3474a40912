// src/dtos/purchase.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub location_id: String,
    pub note: Option<String>,
    pub items: Vec<PurchaseLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost: Option<f64>, // Optional - uses the product's cost_price if not provided
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub id: String,
    pub total_amount: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PurchaseItemResponse>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseItemResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_cost: f64,
    pub line_total: f64,
}
