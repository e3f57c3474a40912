pub mod catalog;
pub mod customers;
pub mod inventory;
pub mod locations;
pub mod orders;
pub mod payments;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod stock_movements;

use axum::Router;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(products::routes())
        .merge(catalog::routes())
        .merge(customers::routes())
        .merge(locations::routes())
        .merge(inventory::routes())
        .merge(stock_movements::routes())
        .merge(sales::routes())
        .merge(purchases::routes())
        .merge(orders::routes())
        .merge(payments::routes())
}
