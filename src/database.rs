// src/database.rs
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

// Schema is applied on startup. Statements are idempotent so re-running
// against an existing database file is safe. Tables referenced by foreign
// keys are created before their referrers.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS brands (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        sku TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        category_id TEXT REFERENCES categories(id),
        brand_id TEXT REFERENCES brands(id),
        unit_price REAL NOT NULL DEFAULT 0,
        cost_price REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS locations (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        address TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS customers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        phone TEXT,
        email TEXT,
        current_balance REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS inventory_levels (
        id TEXT PRIMARY KEY,
        product_id TEXT NOT NULL REFERENCES products(id),
        location_id TEXT NOT NULL REFERENCES locations(id),
        quantity_on_hand INTEGER NOT NULL DEFAULT 0,
        quantity_reserved INTEGER NOT NULL DEFAULT 0,
        stock_status TEXT NOT NULL DEFAULT 'sellable',
        batch_number TEXT,
        serial_number TEXT,
        expiry_date TEXT,
        bin_location TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (product_id, location_id)
    )",
    "CREATE TABLE IF NOT EXISTS transactions (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL CHECK (kind IN ('sale', 'purchase')),
        customer_id TEXT REFERENCES customers(id),
        total_amount REAL NOT NULL,
        note TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transaction_items (
        id TEXT PRIMARY KEY,
        transaction_id TEXT NOT NULL REFERENCES transactions(id),
        product_id TEXT NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL,
        unit_price REAL NOT NULL,
        line_total REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS inventory_movements (
        id TEXT PRIMARY KEY,
        product_id TEXT NOT NULL REFERENCES products(id),
        location_id TEXT NOT NULL REFERENCES locations(id),
        movement_type TEXT NOT NULL CHECK (movement_type IN ('in', 'out', 'adjust')),
        quantity_change INTEGER NOT NULL,
        unit_price_snapshot REAL,
        reason TEXT,
        transaction_id TEXT REFERENCES transactions(id),
        customer_id TEXT REFERENCES customers(id),
        transfer_id TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_movements_product
        ON inventory_movements(product_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_movements_transaction
        ON inventory_movements(transaction_id)",
    "CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        customer_id TEXT REFERENCES customers(id),
        location_id TEXT NOT NULL REFERENCES locations(id),
        status TEXT NOT NULL DEFAULT 'pending'
            CHECK (status IN ('pending', 'fulfilled', 'cancelled')),
        note TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS order_items (
        id TEXT PRIMARY KEY,
        order_id TEXT NOT NULL REFERENCES orders(id),
        product_id TEXT NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL,
        unit_price REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS payments (
        id TEXT PRIMARY KEY,
        customer_id TEXT NOT NULL REFERENCES customers(id),
        amount REAL NOT NULL,
        method TEXT NOT NULL DEFAULT 'cash',
        note TEXT,
        created_at TEXT NOT NULL
    )",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    // Every connection to sqlite::memory: opens a distinct database, so the
    // test pool is pinned to a single connection.
    pub async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("parse sqlite url")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("open in-memory database");
        run_migrations(&pool).await.expect("apply schema");
        pool
    }

    pub async fn seed_product(pool: &SqlitePool, sku: &str, name: &str, unit_price: f64) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO products (id, sku, name, unit_price, cost_price, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(sku)
        .bind(name)
        .bind(unit_price)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("seed product");
        id
    }

    pub async fn seed_location(pool: &SqlitePool, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO locations (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("seed location");
        id
    }

    pub async fn seed_customer(pool: &SqlitePool, name: &str, balance: f64) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO customers (id, name, current_balance, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(balance)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("seed customer");
        id
    }

    pub async fn seed_level(
        pool: &SqlitePool,
        product_id: &str,
        location_id: &str,
        on_hand: i64,
        reserved: i64,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO inventory_levels
                (id, product_id, location_id, quantity_on_hand, quantity_reserved,
                 stock_status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'sellable', ?, ?)",
        )
        .bind(&id)
        .bind(product_id)
        .bind(location_id)
        .bind(on_hand)
        .bind(reserved)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .expect("seed inventory level");
        id
    }

    pub async fn on_hand(pool: &SqlitePool, product_id: &str, location_id: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT quantity_on_hand FROM inventory_levels WHERE product_id = ? AND location_id = ?",
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_one(pool)
        .await
        .expect("read on-hand quantity")
    }

    pub async fn movement_count(pool: &SqlitePool, product_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movements WHERE product_id = ?")
            .bind(product_id)
            .fetch_one(pool)
            .await
            .expect("count movements")
    }

    pub async fn customer_balance(pool: &SqlitePool, customer_id: &str) -> f64 {
        sqlx::query_scalar("SELECT current_balance FROM customers WHERE id = ?")
            .bind(customer_id)
            .fetch_one(pool)
            .await
            .expect("read customer balance")
    }
}
