// src/dtos/product.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub unit_price: f64,
    pub cost_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub unit_price: Option<f64>,
    pub cost_price: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub unit_price: f64,
    pub cost_price: f64,
    pub created_at: String,
    pub updated_at: String,
}

// Convert from Model to Response DTO
impl From<crate::models::product::Product> for ProductResponse {
    fn from(product: crate::models::product::Product) -> Self {
        Self {
            id: product.id,
            sku: product.sku,
            name: product.name,
            category_id: product.category_id,
            brand_id: product.brand_id,
            unit_price: product.unit_price,
            cost_price: product.cost_price,
            created_at: product.created_at.to_rfc3339(),
            updated_at: product.updated_at.to_rfc3339(),
        }
    }
}
