//! HTTP route definitions and handlers.
//!
//! The auth proxy routes forward to the upstream backend; the health route
//! answers locally.

mod auth_routes;
mod health_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes::routes())
        .merge(health_routes::routes())
        .with_state(state)
}
