use axum::{
    routing::get,
    Router,
};
use crate::handlers::location::{
    create_location, delete_location, get_locations, update_location,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/locations", get(get_locations).post(create_location))
        .route("/locations/{id}", axum::routing::put(update_location).delete(delete_location))
}
