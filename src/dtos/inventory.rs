// src/dtos/inventory.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::inventory::{MovementType, StockStatus};

// ==================== Inventory level DTOs ====================

#[derive(Debug, Deserialize)]
pub struct CreateInventoryLevelRequest {
    pub product_id: String,
    pub location_id: String,
    pub quantity_on_hand: Option<i64>,
    pub stock_status: Option<StockStatus>,
    pub batch_number: Option<String>,
    pub serial_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub bin_location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InventoryLevelResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub location_id: String,
    pub location_name: String,
    pub quantity_on_hand: i64,
    pub quantity_reserved: i64,
    pub available: i64,
    pub stock_status: StockStatus,
    pub batch_number: Option<String>,
    pub serial_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub bin_location: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ==================== Stock movement DTOs ====================

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: String,
    pub location_id: String,
    pub new_quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdjustStockResponse {
    // None when the count already matched and no movement was written.
    pub movement_id: Option<String>,
    pub quantity_change: i64,
    pub new_on_hand: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransferStockRequest {
    pub product_id: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferStockResponse {
    pub transfer_id: String,
    pub source_on_hand: i64,
    pub destination_on_hand: i64,
}

// Movement history scoped to one inventory level; the product and location
// are implied by the level, so no names are joined in.
#[derive(Debug, Serialize)]
pub struct LevelMovementResponse {
    pub id: String,
    pub movement_type: MovementType,
    pub quantity_change: i64,
    pub unit_price_snapshot: Option<f64>,
    pub reason: Option<String>,
    pub transaction_id: Option<String>,
    pub customer_id: Option<String>,
    pub transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::models::inventory::InventoryMovement> for LevelMovementResponse {
    fn from(movement: crate::models::inventory::InventoryMovement) -> Self {
        Self {
            id: movement.id,
            movement_type: movement.movement_type,
            quantity_change: movement.quantity_change,
            unit_price_snapshot: movement.unit_price_snapshot,
            reason: movement.reason,
            transaction_id: movement.transaction_id,
            customer_id: movement.customer_id,
            transfer_id: movement.transfer_id,
            created_at: movement.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub location_id: String,
    pub location_name: String,
    pub movement_type: MovementType,
    pub quantity_change: i64,
    pub unit_price_snapshot: Option<f64>,
    pub reason: Option<String>,
    pub transaction_id: Option<String>,
    pub customer_id: Option<String>,
    pub transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
