//! Application startup and server initialization.
//!
//! Builds the shared state and router for the auth proxy and serves it on
//! the configured address.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::routes;
use crate::state::AppState;

/// Initializes and runs the auth proxy.
///
/// # Errors
///
/// Returns an error if the upstream client cannot be built, the server fails
/// to bind to the configured address, or serving fails.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config.clone())?;
    let app = routes::create_router(state);

    info!(
        "Starting auth proxy on {} (upstream {})",
        config.bind_address, config.upstream.base_url
    );
    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
