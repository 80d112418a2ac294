pub mod check;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod state;
pub mod store;
pub mod usage;

use axum::{routing::get, Router};

use crate::state::AppState;

/// The API routes, without metrics or middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/check",
            get(handlers::check::get_check).post(handlers::check::post_check),
        )
        .route("/history", get(handlers::history::get_history))
        .with_state(state)
}
