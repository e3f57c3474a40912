// src/state.rs
use sqlx::SqlitePool;

use crate::ledger::StockPolicy;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub stock_policy: StockPolicy,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, stock_policy: StockPolicy) -> Self {
        Self {
            db_pool,
            stock_policy,
        }
    }
}
