use axum::Router;

use crate::{config::AppConfig, state::AppState};

pub mod auth;
pub mod cart;
pub mod doc;
pub mod health;
pub mod pages;
pub mod params;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/auth", auth::router(config.debug_routes))
        .nest("/cart", cart::router())
        .nest("/pages", pages::router())
}
