//! CORS policy for the storefront's browser calls.

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

pub const ALLOW_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// `Content-Type, Authorization` plus the configured extras.
pub fn allow_headers(config: &CorsConfig) -> Result<Vec<HeaderName>, String> {
    let mut headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION];
    for name in &config.extra_allow_headers {
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("Invalid CORS header '{}': {}", name, e))?;
        if !headers.contains(&parsed) {
            headers.push(parsed);
        }
    }
    Ok(headers)
}

/// Answers every `OPTIONS` request itself with the fixed allow lists.
pub fn layer(config: &CorsConfig) -> Result<CorsLayer, String> {
    let allow_origin = if config.allow_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = config
            .allow_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).map_err(|e| format!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(ALLOW_METHODS.to_vec())
        .allow_headers(allow_headers(config)?)
        .max_age(Duration::from_secs(60 * 10)))
}
