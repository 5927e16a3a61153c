//! HTTP route definitions and handlers.
//!
//! Health and metrics are explicit routes; everything else falls through to the
//! table-driven proxy handler.

pub mod cors;
mod health_routes;
mod metrics;
mod proxy_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Creates the application router with all configured routes.
///
/// Fails when the CORS section holds values that are not valid header text.
pub fn create_router(state: AppState) -> Result<Router, String> {
    let cors = cors::layer(&state.config.cors)?;

    Ok(Router::new()
        .merge(health_routes::routes())
        .merge(metrics::routes())
        .fallback(proxy_routes::proxy)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
