//! Application startup and server initialization.
//!
//! This module wires the token cache, forwarder and route table into the
//! shared state, then serves the router until Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::proxy::{Forwarder, RouteTable};
use crate::routes;
use crate::state::AppState;
use crate::token::{OAuthRefreshSource, TokenCache};

/// Builds the shared state: one HTTP client, one token cache, one route table.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or a route entry is invalid.
pub fn build_state(config: Arc<ConfigV1>) -> Result<AppState, Box<dyn std::error::Error>> {
    let metrics = Metrics::new();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http.timeout_in_ms))
        .build()?;

    let source = Arc::new(OAuthRefreshSource::new(client.clone(), config.oauth.clone()));
    let tokens = Arc::new(TokenCache::new(
        source,
        Duration::from_secs(config.oauth.default_ttl_secs),
        metrics.clone(),
    ));
    let forwarder = Arc::new(Forwarder::new(client, tokens, metrics.clone()));
    let route_table = RouteTable::new(&config.routes)?;

    for route in route_table.routes() {
        info!(
            "Route '{}': {} -> {} (secondary: {})",
            route.name,
            if route.prefix.is_empty() { "/" } else { route.prefix.as_str() },
            route.primary_url,
            route.secondary_url.as_deref().unwrap_or("none")
        );
    }

    Ok(AppState {
        config,
        routes: Arc::new(route_table),
        forwarder,
        metrics,
    })
}

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if the state cannot be built, the server fails to bind
/// to the configured address, or it encounters a runtime error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.listen_address();
    let state = build_state(config)?;
    let app = routes::create_router(state)?;

    info!("Starting server on {}", address);
    let listener = TcpListener::bind(&address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
