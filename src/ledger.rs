// src/ledger.rs
//
// Stock ledger core. Every on-hand mutation writes exactly one movement row
// with the matching signed delta; callers are expected to run these inside a
// database transaction so the pair lands together or not at all.
use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::inventory::{InventoryLevel, MovementType};

/// What happens when a decrement would take available stock below zero.
/// `Strict` rejects the operation; `AllowNegative` records it anyway.
/// Configured once at startup via `STOCK_POLICY` and injected through
/// `AppState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockPolicy {
    Strict,
    AllowNegative,
}

impl StockPolicy {
    pub fn from_env() -> Self {
        match std::env::var("STOCK_POLICY").as_deref() {
            Ok("allow_negative") => StockPolicy::AllowNegative,
            Ok("strict") | Err(_) => StockPolicy::Strict,
            Ok(other) => {
                tracing::warn!(value = other, "Unrecognized STOCK_POLICY, using strict");
                StockPolicy::Strict
            }
        }
    }
}

#[derive(Debug)]
pub struct AppliedMovement {
    pub movement_id: String,
    pub quantity_change: i64,
    pub new_on_hand: i64,
}

#[derive(Debug)]
pub struct TransferOutcome {
    pub transfer_id: String,
    pub source_on_hand: i64,
    pub destination_on_hand: i64,
}

async fn fetch_level(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
) -> Result<Option<InventoryLevel>, sqlx::Error> {
    sqlx::query_as::<_, InventoryLevel>(
        "SELECT id, product_id, location_id, quantity_on_hand, quantity_reserved,
                stock_status, batch_number, serial_number, expiry_date, bin_location,
                created_at, updated_at
         FROM inventory_levels
         WHERE product_id = ? AND location_id = ?",
    )
    .bind(product_id)
    .bind(location_id)
    .fetch_optional(&mut *conn)
    .await
}

async fn set_on_hand(
    conn: &mut SqliteConnection,
    level_id: &str,
    quantity: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE inventory_levels SET quantity_on_hand = ?, updated_at = ? WHERE id = ?")
        .bind(quantity)
        .bind(Utc::now())
        .bind(level_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn create_level(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
    on_hand: i64,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO inventory_levels
            (id, product_id, location_id, quantity_on_hand, quantity_reserved,
             stock_status, created_at, updated_at)
         VALUES (?, ?, ?, ?, 0, 'sellable', ?, ?)",
    )
    .bind(&id)
    .bind(product_id)
    .bind(location_id)
    .bind(on_hand)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

struct NewMovement<'a> {
    product_id: &'a str,
    location_id: &'a str,
    movement_type: MovementType,
    quantity_change: i64,
    unit_price_snapshot: Option<f64>,
    reason: Option<&'a str>,
    transaction_id: Option<&'a str>,
    customer_id: Option<&'a str>,
    transfer_id: Option<&'a str>,
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: NewMovement<'_>,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO inventory_movements
            (id, product_id, location_id, movement_type, quantity_change,
             unit_price_snapshot, reason, transaction_id, customer_id, transfer_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(movement.product_id)
    .bind(movement.location_id)
    .bind(movement.movement_type)
    .bind(movement.quantity_change)
    .bind(movement.unit_price_snapshot)
    .bind(movement.reason)
    .bind(movement.transaction_id)
    .bind(movement.customer_id)
    .bind(movement.transfer_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

/// Set the on-hand quantity to an observed count. Returns `None` when the
/// count already matches: nothing changed, so no movement is recorded.
pub async fn adjust(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
    new_quantity: i64,
    reason: Option<&str>,
) -> Result<Option<AppliedMovement>, AppError> {
    if new_quantity < 0 {
        return Err(AppError::validation("Adjusted quantity cannot be negative"));
    }

    let level = fetch_level(conn, product_id, location_id)
        .await?
        .ok_or_else(|| AppError::not_found("No inventory level for this product at this location"))?;

    let delta = new_quantity - level.quantity_on_hand;
    if delta == 0 {
        return Ok(None);
    }

    set_on_hand(conn, &level.id, new_quantity).await?;
    let movement_id = insert_movement(
        conn,
        NewMovement {
            product_id,
            location_id,
            movement_type: MovementType::Adjust,
            quantity_change: delta,
            unit_price_snapshot: None,
            reason,
            transaction_id: None,
            customer_id: None,
            transfer_id: None,
        },
    )
    .await?;

    Ok(Some(AppliedMovement {
        movement_id,
        quantity_change: delta,
        new_on_hand: new_quantity,
    }))
}

/// Move stock between two locations. Writes an `out` movement at the source
/// and an `in` movement at the destination sharing one transfer id, and
/// updates both level rows. The destination level is created on first
/// receipt; the source level must already exist.
pub async fn transfer(
    conn: &mut SqliteConnection,
    product_id: &str,
    from_location_id: &str,
    to_location_id: &str,
    quantity: i64,
    reason: Option<&str>,
    policy: StockPolicy,
) -> Result<TransferOutcome, AppError> {
    if quantity <= 0 {
        return Err(AppError::validation("Transfer quantity must be greater than 0"));
    }
    if from_location_id == to_location_id {
        return Err(AppError::validation(
            "Source and destination locations must differ",
        ));
    }

    let source = fetch_level(conn, product_id, from_location_id)
        .await?
        .ok_or_else(|| AppError::not_found("No inventory level at the source location"))?;

    if policy == StockPolicy::Strict && source.available() < quantity {
        return Err(AppError::validation(format!(
            "Insufficient stock. Available: {}, Requested: {}",
            source.available(),
            quantity
        )));
    }

    let destination = fetch_level(conn, product_id, to_location_id).await?;

    let source_on_hand = source.quantity_on_hand - quantity;
    set_on_hand(conn, &source.id, source_on_hand).await?;

    let destination_on_hand = match destination {
        Some(level) => {
            let updated = level.quantity_on_hand + quantity;
            set_on_hand(conn, &level.id, updated).await?;
            updated
        }
        None => {
            create_level(conn, product_id, to_location_id, quantity).await?;
            quantity
        }
    };

    let transfer_id = Uuid::new_v4().to_string();
    insert_movement(
        conn,
        NewMovement {
            product_id,
            location_id: from_location_id,
            movement_type: MovementType::Out,
            quantity_change: -quantity,
            unit_price_snapshot: None,
            reason,
            transaction_id: None,
            customer_id: None,
            transfer_id: Some(&transfer_id),
        },
    )
    .await?;
    insert_movement(
        conn,
        NewMovement {
            product_id,
            location_id: to_location_id,
            movement_type: MovementType::In,
            quantity_change: quantity,
            unit_price_snapshot: None,
            reason,
            transaction_id: None,
            customer_id: None,
            transfer_id: Some(&transfer_id),
        },
    )
    .await?;

    Ok(TransferOutcome {
        transfer_id,
        source_on_hand,
        destination_on_hand,
    })
}

/// Apply one sale or purchase line: a single movement plus the matching
/// on-hand update. Negative quantities are `out` movements subject to the
/// sufficiency policy; positive quantities are `in` movements and create the
/// level row when the location has never held the product.
#[allow(clippy::too_many_arguments)]
pub async fn apply_line(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
    signed_quantity: i64,
    unit_price: f64,
    transaction_id: &str,
    customer_id: Option<&str>,
    policy: StockPolicy,
) -> Result<AppliedMovement, AppError> {
    if signed_quantity == 0 {
        return Err(AppError::validation("Line quantity cannot be 0"));
    }

    let movement_type = if signed_quantity < 0 {
        MovementType::Out
    } else {
        MovementType::In
    };

    let level = fetch_level(conn, product_id, location_id).await?;

    let new_on_hand = match &level {
        Some(level) => {
            if signed_quantity < 0
                && policy == StockPolicy::Strict
                && level.available() < -signed_quantity
            {
                return Err(AppError::validation(format!(
                    "Insufficient stock. Available: {}, Requested: {}",
                    level.available(),
                    -signed_quantity
                )));
            }
            level.quantity_on_hand + signed_quantity
        }
        None => {
            if signed_quantity < 0 && policy == StockPolicy::Strict {
                return Err(AppError::validation(format!(
                    "Insufficient stock. Available: 0, Requested: {}",
                    -signed_quantity
                )));
            }
            signed_quantity
        }
    };

    match level {
        Some(level) => set_on_hand(conn, &level.id, new_on_hand).await?,
        None => {
            create_level(conn, product_id, location_id, new_on_hand).await?;
        }
    }

    let movement_id = insert_movement(
        conn,
        NewMovement {
            product_id,
            location_id,
            movement_type,
            quantity_change: signed_quantity,
            unit_price_snapshot: Some(unit_price),
            reason: None,
            transaction_id: Some(transaction_id),
            customer_id,
            transfer_id: None,
        },
    )
    .await?;

    Ok(AppliedMovement {
        movement_id,
        quantity_change: signed_quantity,
        new_on_hand,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::*;
    use sqlx::SqlitePool;

    async fn setup() -> (SqlitePool, String, String, String) {
        let pool = test_pool().await;
        let product = seed_product(&pool, "SKU-001", "Whole Milk 1L", 2.50).await;
        let from = seed_location(&pool, "Main store").await;
        let to = seed_location(&pool, "Back room").await;
        (pool, product, from, to)
    }

    #[tokio::test]
    async fn adjust_sets_on_hand_and_writes_matching_movement() {
        let (pool, product, location, _) = setup().await;
        seed_level(&pool, &product, &location, 10, 0).await;

        let mut tx = pool.begin().await.unwrap();
        let applied = adjust(&mut tx, &product, &location, 7, Some("count correction"))
            .await
            .unwrap()
            .expect("non-zero delta records a movement");
        tx.commit().await.unwrap();

        assert_eq!(applied.quantity_change, -3);
        assert_eq!(applied.new_on_hand, 7);
        assert_eq!(on_hand(&pool, &product, &location).await, 7);

        let (movement_type, delta, reason): (String, i64, Option<String>) = sqlx::query_as(
            "SELECT movement_type, quantity_change, reason FROM inventory_movements WHERE product_id = ?",
        )
        .bind(&product)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(movement_type, "adjust");
        assert_eq!(delta, -3);
        assert_eq!(reason.as_deref(), Some("count correction"));
    }

    #[tokio::test]
    async fn adjust_without_level_row_fails() {
        let (pool, product, location, _) = setup().await;

        let mut tx = pool.begin().await.unwrap();
        let err = adjust(&mut tx, &product, &location, 5, None).await;
        assert!(matches!(err, Err(crate::error::AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn repeated_adjust_with_same_count_is_a_noop() {
        let (pool, product, location, _) = setup().await;
        seed_level(&pool, &product, &location, 10, 0).await;

        for expected_movements in [1_i64, 1] {
            let mut tx = pool.begin().await.unwrap();
            adjust(&mut tx, &product, &location, 7, None).await.unwrap();
            tx.commit().await.unwrap();
            assert_eq!(on_hand(&pool, &product, &location).await, 7);
            assert_eq!(movement_count(&pool, &product).await, expected_movements);
        }
    }

    #[tokio::test]
    async fn adjust_rejects_negative_count() {
        let (pool, product, location, _) = setup().await;
        seed_level(&pool, &product, &location, 10, 0).await;

        let mut tx = pool.begin().await.unwrap();
        let err = adjust(&mut tx, &product, &location, -1, None).await;
        assert!(matches!(
            err,
            Err(crate::error::AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn transfer_moves_stock_and_conserves_total() {
        let (pool, product, from, to) = setup().await;
        seed_level(&pool, &product, &from, 7, 0).await;

        let mut tx = pool.begin().await.unwrap();
        let outcome = transfer(&mut tx, &product, &from, &to, 5, None, StockPolicy::Strict)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(outcome.source_on_hand, 2);
        assert_eq!(outcome.destination_on_hand, 5);
        assert_eq!(on_hand(&pool, &product, &from).await, 2);
        assert_eq!(on_hand(&pool, &product, &to).await, 5);

        let total: i64 =
            sqlx::query_scalar("SELECT SUM(quantity_on_hand) FROM inventory_levels WHERE product_id = ?")
                .bind(&product)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(total, 7);

        let legs: Vec<(String, i64, Option<String>)> = sqlx::query_as(
            "SELECT movement_type, quantity_change, transfer_id
             FROM inventory_movements WHERE product_id = ? ORDER BY quantity_change",
        )
        .bind(&product)
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].0, "out");
        assert_eq!(legs[0].1, -5);
        assert_eq!(legs[1].0, "in");
        assert_eq!(legs[1].1, 5);
        assert_eq!(legs[0].2, legs[1].2);
        assert!(legs[0].2.is_some());
    }

    #[tokio::test]
    async fn transfer_insufficient_stock_rejected_under_strict() {
        let (pool, product, from, to) = setup().await;
        seed_level(&pool, &product, &from, 7, 0).await;

        let mut tx = pool.begin().await.unwrap();
        let err = transfer(&mut tx, &product, &from, &to, 50, None, StockPolicy::Strict).await;
        assert!(matches!(
            err,
            Err(crate::error::AppError::ValidationError(_))
        ));
        tx.commit().await.unwrap();

        assert_eq!(on_hand(&pool, &product, &from).await, 7);
        assert_eq!(movement_count(&pool, &product).await, 0);
    }

    #[tokio::test]
    async fn transfer_counts_reserved_stock_as_unavailable() {
        let (pool, product, from, to) = setup().await;
        seed_level(&pool, &product, &from, 10, 4).await;

        let mut tx = pool.begin().await.unwrap();
        let err = transfer(&mut tx, &product, &from, &to, 8, None, StockPolicy::Strict).await;
        assert!(err.is_err());
        drop(tx);

        let mut tx = pool.begin().await.unwrap();
        transfer(&mut tx, &product, &from, &to, 6, None, StockPolicy::Strict)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(on_hand(&pool, &product, &from).await, 4);
        assert_eq!(on_hand(&pool, &product, &to).await, 6);
    }

    #[tokio::test]
    async fn transfer_can_oversell_when_policy_allows() {
        let (pool, product, from, to) = setup().await;
        seed_level(&pool, &product, &from, 2, 0).await;

        let mut tx = pool.begin().await.unwrap();
        transfer(&mut tx, &product, &from, &to, 5, None, StockPolicy::AllowNegative)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(on_hand(&pool, &product, &from).await, -3);
        assert_eq!(on_hand(&pool, &product, &to).await, 5);
        assert_eq!(movement_count(&pool, &product).await, 2);
    }

    #[tokio::test]
    async fn transfer_rejects_bad_arguments() {
        let (pool, product, from, _) = setup().await;
        seed_level(&pool, &product, &from, 10, 0).await;

        let mut tx = pool.begin().await.unwrap();
        assert!(transfer(&mut tx, &product, &from, &from, 5, None, StockPolicy::Strict)
            .await
            .is_err());
        assert!(transfer(&mut tx, &product, &from, "elsewhere", 0, None, StockPolicy::Strict)
            .await
            .is_err());
        assert!(transfer(&mut tx, &product, &from, "elsewhere", -2, None, StockPolicy::Strict)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn apply_line_creates_level_on_first_receipt() {
        let (pool, product, location, _) = setup().await;

        let mut tx = pool.begin().await.unwrap();
        let applied = apply_line(
            &mut tx,
            &product,
            &location,
            12,
            1.80,
            "txn-1",
            None,
            StockPolicy::Strict,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(applied.new_on_hand, 12);
        assert_eq!(on_hand(&pool, &product, &location).await, 12);

        let snapshot: Option<f64> = sqlx::query_scalar(
            "SELECT unit_price_snapshot FROM inventory_movements WHERE product_id = ?",
        )
        .bind(&product)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(snapshot, Some(1.80));
    }

    #[tokio::test]
    async fn apply_line_blocks_oversell_under_strict() {
        let (pool, product, location, _) = setup().await;
        seed_level(&pool, &product, &location, 3, 0).await;

        let mut tx = pool.begin().await.unwrap();
        let err = apply_line(
            &mut tx,
            &product,
            &location,
            -5,
            2.50,
            "txn-1",
            None,
            StockPolicy::Strict,
        )
        .await;
        assert!(matches!(
            err,
            Err(crate::error::AppError::ValidationError(_))
        ));
        tx.commit().await.unwrap();

        assert_eq!(on_hand(&pool, &product, &location).await, 3);
        assert_eq!(movement_count(&pool, &product).await, 0);
    }
}
