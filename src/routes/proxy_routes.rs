//! The generic forwarding handler behind every configured route prefix.
//!
//! `OPTIONS` never reaches it: the CORS layer answers every preflight.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ProxyError;
use crate::metrics::MetricsRecorder;
use crate::models::{InboundRequest, UpstreamResponse};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Resolves the inbound path against the route table and relays the upstream answer.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HTTPError> {
    let path = uri.path();
    let (route, _) = state
        .routes
        .resolve(path)
        .ok_or_else(|| ProxyError::RouteNotFound(path.to_string()))?;

    let span = info_span!(
        "proxy_request",
        request_id = %Uuid::new_v4(),
        route = route.name.as_str(),
        method = %method,
        path,
    );

    let request = InboundRequest::new(method.clone(), path, uri.query().map(str::to_string))
        .with_headers(headers)
        .with_body(body);
    let result = state
        .forwarder
        .forward(route, request)
        .instrument(span.clone())
        .await;

    let status = match &result {
        Ok(resp) => resp.status,
        Err(e) => e.status(),
    };
    state
        .metrics
        .record_proxy_response(&route.name, status.as_u16());

    span.in_scope(|| match &result {
        Ok(resp) => info!(
            event_name = "proxy.response",
            event_domain = "proxy",
            status = status.as_u16(),
            target = resp.target.as_str(),
            "request forwarded"
        ),
        Err(e) => warn!(
            event_name = "proxy.response",
            event_domain = "proxy",
            status = status.as_u16(),
            error = %e,
            "request failed"
        ),
    });

    Ok(relay(result?))
}

/// Upstream headers are applied after `Json`, so a HAL content type survives.
fn relay(resp: UpstreamResponse) -> Response {
    match resp.body {
        Some(body) => (resp.status, resp.headers, Json(body)).into_response(),
        None => (resp.status, resp.headers).into_response(),
    }
}
