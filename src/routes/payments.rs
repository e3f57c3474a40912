use axum::{
    routing::get,
    Router,
};
use crate::handlers::payment::{create_payment, list_payments};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/payments", get(list_payments).post(create_payment))
}
