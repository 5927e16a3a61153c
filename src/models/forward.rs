use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

/// What the proxy received, reduced to the parts that are forwarded.
#[derive(Clone, Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>, query: Option<String>) -> Self {
        InboundRequest {
            method,
            path: path.into(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// The outbound call built for one upstream attempt.
#[derive(Clone, Debug)]
pub struct ForwardedRequest {
    pub method: Method,
    pub target_url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ForwardedRequest {
    /// Same request against another base URL; only the host part changes.
    pub fn retarget(&self, target_url: String) -> Self {
        ForwardedRequest {
            target_url,
            ..self.clone()
        }
    }
}

/// Which configured host served (or failed) a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Primary,
    Secondary,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Primary => "primary",
            Target::Secondary => "secondary",
        }
    }
}

/// A successful upstream answer, relayed to the caller after shaping.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// Relayed subset: content type, location, caching and link headers.
    pub headers: HeaderMap,
    /// `None` for empty bodies (e.g. 204).
    pub body: Option<Value>,
    pub target: Target,
}
