use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Purchase,
}

/// Sale/purchase header. Owns its `transaction_items` rows and, for sales,
/// the `out` movements linked back to it.
#[derive(Debug, FromRow)]
pub struct TransactionRecord {
    pub id: String,
    pub kind: TransactionKind,
    pub customer_id: Option<String>,
    pub total_amount: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
