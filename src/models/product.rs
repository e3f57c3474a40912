use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub unit_price: f64,
    pub cost_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
