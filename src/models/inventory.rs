use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Direction of a ledger entry. Adjustments carry a signed delta and can go
/// either way; `in`/`out` entries always match the sign of their delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Adjust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Sellable,
    Damaged,
    Quarantine,
    Expired,
}

/// One row per (product, location) pair. `available` is derived as
/// `quantity_on_hand - quantity_reserved` and never stored.
#[derive(Debug, FromRow)]
pub struct InventoryLevel {
    pub id: String,
    pub product_id: String,
    pub location_id: String,
    pub quantity_on_hand: i64,
    pub quantity_reserved: i64,
    pub stock_status: StockStatus,
    pub batch_number: Option<String>,
    pub serial_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub bin_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryLevel {
    pub fn available(&self) -> i64 {
        self.quantity_on_hand - self.quantity_reserved
    }
}

/// Append-only ledger entry. Rows are inserted once and never mutated.
#[derive(Debug, FromRow)]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    pub location_id: String,
    pub movement_type: MovementType,
    pub quantity_change: i64,
    pub unit_price_snapshot: Option<f64>,
    pub reason: Option<String>,
    pub transaction_id: Option<String>,
    pub customer_id: Option<String>,
    pub transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
