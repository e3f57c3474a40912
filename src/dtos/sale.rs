// src/dtos/sale.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub customer_id: Option<String>,
    pub location_id: String,
    pub note: Option<String>,
    pub items: Vec<SaleLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Option<f64>, // Optional - uses the product's unit_price if not provided
}

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub id: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub total_amount: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleItemResponse>,
    pub summary: SaleSummary,
}

#[derive(Debug, Serialize)]
pub struct SaleItemResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Serialize)]
pub struct SaleSummary {
    pub total_lines: i64,
    pub total_quantity: i64,
    // Amount added to the customer balance; 0.0 for cash sales.
    pub balance_posted: f64,
}

#[derive(Debug, Serialize)]
pub struct SaleListItem {
    pub id: String,
    pub customer_name: Option<String>,
    pub total_amount: f64,
    pub total_lines: i64,
    pub created_at: DateTime<Utc>,
}
