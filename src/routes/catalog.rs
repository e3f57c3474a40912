use axum::{
    routing::{get, put},
    Router,
};
use crate::handlers::catalog::{
    create_brand, create_category, delete_brand, delete_category, get_brands, get_categories,
    update_brand, update_category,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(get_categories).post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
        .route("/brands", get(get_brands).post(create_brand))
        .route("/brands/{id}", put(update_brand).delete(delete_brand))
}
