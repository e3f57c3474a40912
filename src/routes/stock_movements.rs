use axum::{
    routing::{get, post},
    Router,
};
use crate::handlers::stock_movement;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stock-movements/adjust", post(stock_movement::adjust_stock))
        .route("/stock-movements/transfer", post(stock_movement::transfer_stock))
        .route(
            "/stock-movements/products/{product_id}",
            get(stock_movement::get_product_movements),
        )
}
