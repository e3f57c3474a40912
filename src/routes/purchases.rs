use axum::{
    routing::get,
    Router,
};
use crate::handlers::purchase;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/purchases", get(purchase::list_purchases).post(purchase::create_purchase))
        .route("/purchases/{id}", get(purchase::get_purchase))
}
