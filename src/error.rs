//! Error taxonomy for token refreshes and forwarded calls.

use axum::http::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

use crate::utils::http_helpers::HTTPError;

pub type Result<T, E = ProxyError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The token endpoint was unreachable or rejected the credentials.
    #[error("token refresh failed (status {status:?}): {body}")]
    TokenRefresh {
        status: Option<StatusCode>,
        body: String,
    },
    /// The upstream API answered with a non-2xx status.
    #[error("upstream returned {status}")]
    UpstreamRequest { status: StatusCode, body: Value },
    /// The upstream API answered 2xx with a body that is not JSON.
    #[error("unexpected upstream response: {0}")]
    UpstreamResponse(String),
    /// No upstream host could be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("no route configured for '{0}'")]
    RouteNotFound(String),
    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),
}

impl ProxyError {
    /// Status code presented to the proxy's caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::TokenRefresh { .. } | ProxyError::UpstreamResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::UpstreamRequest { status, .. } => *status,
            ProxyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ProxyError> for HTTPError {
    fn from(err: ProxyError) -> Self {
        let status = err.status();
        match err {
            ProxyError::TokenRefresh { .. } => {
                HTTPError::new(status, "Failed to obtain upstream access token", None)
            }
            ProxyError::UpstreamResponse(_) => {
                HTTPError::new(status, "Unexpected response from upstream API", None)
            }
            ProxyError::UpstreamRequest { status, body } => HTTPError::new(
                status,
                format!("Upstream API request failed with status {}", status.as_u16()),
                Some(json!({ "status": status.as_u16(), "details": body })),
            ),
            other => HTTPError::new(status, other.to_string(), None),
        }
    }
}
