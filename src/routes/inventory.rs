use axum::{
    routing::get,
    Router,
};
use crate::handlers::inventory::{create_level, get_level, list_level_movements, list_levels};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/inventory/levels", get(list_levels).post(create_level))
        .route("/inventory/levels/{id}", get(get_level))
        .route("/inventory/levels/{id}/movements", get(list_level_movements))
}
