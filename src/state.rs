//! Shared application state.
//!
//! Contains the state that is shared across all request handlers:
//! configuration, the route table and the forwarder owning the token cache.

use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::proxy::{Forwarder, RouteTable};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request handler; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Inbound prefix -> upstream mapping.
    pub routes: Arc<RouteTable>,
    /// Upstream client holding the process-wide token cache.
    pub forwarder: Arc<Forwarder>,
    /// Prometheus metrics registry and recorders.
    pub metrics: Metrics,
}
