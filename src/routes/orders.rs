use axum::{
    routing::{get, post},
    Router,
};
use crate::handlers::order;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(order::list_orders).post(order::create_order))
        .route("/orders/{id}", get(order::get_order))
        .route("/orders/{id}/cancel", post(order::cancel_order))
        .route("/orders/{id}/checkout", post(order::checkout_order))
}
