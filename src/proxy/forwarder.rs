use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, ETAG, LINK, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ProxyError, Result};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{ForwardedRequest, InboundRequest, Target, UpstreamResponse};
use crate::proxy::router::Route;
use crate::proxy::transform::ResponseTransform;
use crate::token::TokenCache;
use crate::utils::log_throttle::LogThrottle;

const FALLBACK_LOG_WINDOW: Duration = Duration::from_secs(30);

/// Sends inbound requests to a route's upstream with the cached bearer token,
/// retrying once against the secondary host when the primary attempt fails.
pub struct Forwarder {
    client: reqwest::Client,
    tokens: Arc<TokenCache>,
    metrics: Metrics,
    fallback_log: LogThrottle,
}

impl Forwarder {
    pub fn new(client: reqwest::Client, tokens: Arc<TokenCache>, metrics: Metrics) -> Self {
        Self {
            client,
            tokens,
            metrics,
            fallback_log: LogThrottle::new(FALLBACK_LOG_WINDOW),
        }
    }

    pub async fn forward(&self, route: &Route, request: InboundRequest) -> Result<UpstreamResponse> {
        let rest = route
            .rewrite(&request.path)
            .ok_or_else(|| ProxyError::RouteNotFound(request.path.clone()))?;
        let query = request.query.as_deref();
        let body = json_body(&request)?;

        let token = self.tokens.get_token().await?;
        let forwarded = ForwardedRequest {
            method: request.method.clone(),
            target_url: route.primary_target(rest, query),
            headers: outbound_headers(route, &request.headers, &token)?,
            body,
        };

        let err = match self.attempt(route, Target::Primary, &forwarded).await {
            Ok(resp) => return Ok(shape(route, resp)),
            Err(err) => err,
        };

        let rejected = matches!(
            &err,
            ProxyError::UpstreamRequest { status, .. } if *status == StatusCode::UNAUTHORIZED
        );
        if rejected {
            self.tokens.invalidate(&token).await;
        }

        // Only transport failures and non-2xx answers count as a failed attempt.
        let retryable = matches!(
            err,
            ProxyError::UpstreamUnavailable(_) | ProxyError::UpstreamRequest { .. }
        );
        let secondary_url = match route.secondary_target(rest, query) {
            Some(url) if retryable => url,
            _ => return Err(err),
        };

        if let Some(suppressed_count) = self.fallback_log.should_emit(&route.name) {
            warn!(
                event_name = "proxy.fallback",
                event_domain = "proxy",
                route = route.name.as_str(),
                error = %err,
                suppressed_count,
                "primary upstream failed; retrying against secondary"
            );
        }

        let mut fallback = forwarded.retarget(secondary_url);
        if rejected {
            let fresh = self.tokens.get_token().await?;
            fallback.headers.insert(AUTHORIZATION, bearer(&fresh)?);
        }
        let resp = self.attempt(route, Target::Secondary, &fallback).await?;
        Ok(shape(route, resp))
    }

    async fn attempt(
        &self,
        route: &Route,
        target: Target,
        request: &ForwardedRequest,
    ) -> Result<UpstreamResponse> {
        let started = Instant::now();
        let mut builder = self
            .client
            .request(request.method.clone(), &request.target_url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let result = match builder.send().await {
            Ok(resp) => read_response(resp, target).await,
            Err(e) => Err(ProxyError::UpstreamUnavailable(format!(
                "{} host failed for {} {}: {}",
                target.as_str(),
                request.method,
                request.target_url,
                e
            ))),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(ProxyError::UpstreamRequest { .. }) => "http_error",
            Err(ProxyError::UpstreamResponse(_)) => "invalid_body",
            Err(_) => "transport_error",
        };
        self.metrics.record_upstream_attempt(
            &route.name,
            target.as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );
        debug!(
            event_name = "proxy.upstream.attempt",
            event_domain = "proxy",
            route = route.name.as_str(),
            target = target.as_str(),
            method = %request.method,
            url = request.target_url.as_str(),
            outcome,
            "upstream attempt finished"
        );

        result
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn json_body(request: &InboundRequest) -> Result<Option<Value>> {
    if !is_mutating(&request.method) || is_blank(&request.body) {
        return Ok(None);
    }
    serde_json::from_slice(&request.body)
        .map(Some)
        .map_err(|e| ProxyError::InvalidRequestBody(e.to_string()))
}

fn outbound_headers(route: &Route, inbound: &HeaderMap, token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for name in &route.forward_headers {
        for value in inbound.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some((name, value)) = &route.api_version_header {
        headers.insert(name.clone(), value.clone());
    }
    headers.insert(AUTHORIZATION, bearer(token)?);
    Ok(headers)
}

fn bearer(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| ProxyError::TokenRefresh {
        status: None,
        body: "Access token contains characters not allowed in a header".to_string(),
    })
}

/// The upstream response headers the caller gets to see.
fn relayed_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [CONTENT_TYPE, LOCATION, CACHE_CONTROL, ETAG, LINK] {
        for value in upstream.get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

async fn read_response(resp: reqwest::Response, target: Target) -> Result<UpstreamResponse> {
    let status = resp.status();
    let headers = relayed_headers(resp.headers());
    let bytes = resp.bytes().await.map_err(|e| {
        ProxyError::UpstreamUnavailable(format!(
            "Failed to read {} response body: {}",
            target.as_str(),
            e
        ))
    })?;

    if !status.is_success() {
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        return Err(ProxyError::UpstreamRequest { status, body });
    }

    if is_blank(&bytes) {
        return Ok(UpstreamResponse {
            status,
            headers,
            body: None,
            target,
        });
    }

    let body = serde_json::from_slice(&bytes).map_err(|e| {
        ProxyError::UpstreamResponse(format!(
            "{} host returned a non-JSON body: {}",
            target.as_str(),
            e
        ))
    })?;
    Ok(UpstreamResponse {
        status,
        headers,
        body: Some(body),
        target,
    })
}

fn shape(route: &Route, mut resp: UpstreamResponse) -> UpstreamResponse {
    if route.transform == ResponseTransform::Passthrough {
        return resp;
    }
    // A reshaped body is plain JSON and no longer matches the upstream validators.
    resp.headers.remove(CONTENT_TYPE);
    resp.headers.remove(ETAG);
    resp.body = resp.body.map(|body| route.transform.apply(body));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiVersionHeader, RouteConfig};
    use crate::models::TokenResponse;
    use crate::token::TokenSource;
    use async_trait::async_trait;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out "test-token-1", "test-token-2", ... valid for an hour.
    #[derive(Default)]
    struct SequenceSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenSource for SequenceSource {
        async fn fetch(&self) -> Result<TokenResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenResponse {
                access_token: format!("test-token-{}", n),
                expires_in: Some(3600),
                token_type: None,
                refresh_token: None,
                scope: None,
            })
        }
    }

    fn forwarder() -> (Forwarder, Arc<SequenceSource>) {
        let source = Arc::new(SequenceSource::default());
        let tokens = Arc::new(TokenCache::new(
            source.clone(),
            Duration::from_secs(3600),
            Metrics::new(),
        ));
        (
            Forwarder::new(reqwest::Client::new(), tokens, Metrics::new()),
            source,
        )
    }

    fn route(primary: &str, secondary: Option<&str>) -> Route {
        Route::from_config(&RouteConfig {
            name: "shop".to_string(),
            prefix: "/foxycart".to_string(),
            primary_url: primary.to_string(),
            secondary_url: secondary.map(str::to_string),
            api_version_header: Some(ApiVersionHeader {
                name: "FOXY-API-VERSION".to_string(),
                value: "1".to_string(),
            }),
            forward_headers: vec!["x-tenant-id".to_string()],
            transform: ResponseTransform::Passthrough,
        })
        .unwrap()
    }

    fn get(path: &str, query: Option<&str>) -> InboundRequest {
        InboundRequest::new(Method::GET, path, query.map(str::to_string))
    }

    #[tokio::test]
    async fn test_get_is_rewritten_onto_primary_with_bearer() {
        let mut primary = Server::new_async().await;
        let m = primary
            .mock("GET", "/widgets/42")
            .match_query(Matcher::UrlEncoded("x".into(), "1".into()))
            .match_header("authorization", "Bearer test-token-1")
            .match_header("foxy-api-version", "1")
            .with_status(200)
            .with_header("content-type", "application/hal+json")
            .with_body(r#"{"id": 42}"#)
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(&route(&primary.url(), None), get("/foxycart/widgets/42", Some("x=1")))
            .await
            .expect("forward should succeed");

        m.assert_async().await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, Some(json!({"id": 42})));
        assert_eq!(resp.target, Target::Primary);
        assert_eq!(resp.headers[CONTENT_TYPE], "application/hal+json");
    }

    #[tokio::test]
    async fn test_only_whitelisted_response_headers_are_kept() {
        let mut primary = Server::new_async().await;
        primary
            .mock("POST", "/carts")
            .with_status(201)
            .with_header("content-type", "application/hal+json")
            .with_header("location", "https://api.foxycart.com/carts/9")
            .with_header("etag", "\"abc\"")
            .with_header("set-cookie", "fc_session=1")
            .with_body(r#"{"id": 9}"#)
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(
                &route(&primary.url(), None),
                InboundRequest::new(Method::POST, "/foxycart/carts", None).with_body("{}"),
            )
            .await
            .unwrap();

        assert_eq!(resp.headers[LOCATION], "https://api.foxycart.com/carts/9");
        assert_eq!(resp.headers[ETAG], "\"abc\"");
        assert!(resp.headers.get("set-cookie").is_none());
    }

    #[tokio::test]
    async fn test_secondary_untouched_when_primary_succeeds() {
        let mut primary = Server::new_async().await;
        let mut secondary = Server::new_async().await;
        primary
            .mock("GET", "/customers/7")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let backup = secondary
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(
                &route(&primary.url(), Some(&secondary.url())),
                get("/foxycart/customers/7", None),
            )
            .await
            .unwrap();

        backup.assert_async().await;
        assert_eq!(resp.target, Target::Primary);
    }

    #[tokio::test]
    async fn test_secondary_used_when_primary_returns_error() {
        let mut primary = Server::new_async().await;
        let mut secondary = Server::new_async().await;
        primary
            .mock("GET", "/subscriptions/9")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;
        let backup = secondary
            .mock("GET", "/subscriptions/9")
            .match_query(Matcher::UrlEncoded("zoom".into(), "items".into()))
            .match_header("authorization", "Bearer test-token-1")
            .with_status(200)
            .with_body(r#"{"id": 9}"#)
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(
                &route(&primary.url(), Some(&secondary.url())),
                get("/foxycart/subscriptions/9", Some("zoom=items")),
            )
            .await
            .unwrap();

        backup.assert_async().await;
        assert_eq!(resp.target, Target::Secondary);
        assert_eq!(resp.body, Some(json!({"id": 9})));
    }

    #[tokio::test]
    async fn test_secondary_used_when_primary_unreachable() {
        let mut secondary = Server::new_async().await;
        secondary
            .mock("GET", "/carts")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(
                &route("http://127.0.0.1:1", Some(&secondary.url())),
                get("/foxycart/carts", None),
            )
            .await
            .unwrap();

        assert_eq!(resp.target, Target::Secondary);
    }

    #[tokio::test]
    async fn test_both_failing_returns_secondary_error() {
        let mut primary = Server::new_async().await;
        let mut secondary = Server::new_async().await;
        primary
            .mock("GET", "/items/1")
            .with_status(500)
            .create_async()
            .await;
        secondary
            .mock("GET", "/items/1")
            .with_status(404)
            .with_body(r#"{"message": "not found"}"#)
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let err = forwarder
            .forward(
                &route(&primary.url(), Some(&secondary.url())),
                get("/foxycart/items/1", None),
            )
            .await
            .unwrap_err();

        match err {
            ProxyError::UpstreamRequest { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, json!({"message": "not found"}));
            }
            other => panic!("expected UpstreamRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_not_found_is_relayed_without_secondary() {
        let mut primary = Server::new_async().await;
        primary
            .mock("GET", "/customers/404")
            .with_status(404)
            .with_body("no such customer")
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let err = forwarder
            .forward(&route(&primary.url(), None), get("/foxycart/customers/404", None))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(matches!(
            err,
            ProxyError::UpstreamRequest { body: Value::String(ref s), .. } if s == "no such customer"
        ));
    }

    #[tokio::test]
    async fn test_non_json_success_is_not_retried() {
        let mut primary = Server::new_async().await;
        let mut secondary = Server::new_async().await;
        primary
            .mock("GET", "/store")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;
        let backup = secondary
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let err = forwarder
            .forward(
                &route(&primary.url(), Some(&secondary.url())),
                get("/foxycart/store", None),
            )
            .await
            .unwrap_err();

        backup.assert_async().await;
        assert!(matches!(err, ProxyError::UpstreamResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_relayed() {
        let mut primary = Server::new_async().await;
        primary
            .mock("DELETE", "/carts/3")
            .with_status(204)
            .create_async()
            .await;

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(
                &route(&primary.url(), None),
                InboundRequest::new(Method::DELETE, "/foxycart/carts/3", None),
            )
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert_eq!(resp.body, None);
    }

    #[tokio::test]
    async fn test_post_body_and_tenant_header_are_forwarded() {
        let mut primary = Server::new_async().await;
        let m = primary
            .mock("POST", "/customers/7/addresses")
            .match_header("x-tenant-id", "store-12")
            .match_header("cookie", Matcher::Missing)
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"address_name": "Home"})))
            .with_status(201)
            .with_body(r#"{"id": 100}"#)
            .create_async()
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("store-12"));
        headers.insert("cookie", HeaderValue::from_static("session=abc"));
        let request = InboundRequest::new(Method::POST, "/foxycart/customers/7/addresses", None)
            .with_headers(headers)
            .with_body(r#"{"address_name": "Home"}"#);

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(&route(&primary.url(), None), request)
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_invalid_json_body_is_rejected_before_upstream() {
        let mut primary = Server::new_async().await;
        let m = primary
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (forwarder, source) = forwarder();
        let request =
            InboundRequest::new(Method::POST, "/foxycart/carts", None).with_body("not json");
        let err = forwarder
            .forward(&route(&primary.url(), None), request)
            .await
            .unwrap_err();

        m.assert_async().await;
        assert!(matches!(err, ProxyError::InvalidRequestBody(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_cached_token() {
        let mut primary = Server::new_async().await;
        primary
            .mock("GET", "/customers")
            .match_header("authorization", "Bearer test-token-1")
            .with_status(401)
            .create_async()
            .await;
        let second = primary
            .mock("GET", "/customers")
            .match_header("authorization", "Bearer test-token-2")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let (forwarder, source) = forwarder();
        let route = route(&primary.url(), None);
        let err = forwarder
            .forward(&route, get("/foxycart/customers", None))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        forwarder
            .forward(&route, get("/foxycart/customers", None))
            .await
            .unwrap();
        second.assert_async().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_secondary_gets_fresh_token_after_unauthorized() {
        let mut primary = Server::new_async().await;
        let mut secondary = Server::new_async().await;
        primary
            .mock("GET", "/orders")
            .with_status(401)
            .create_async()
            .await;
        let backup = secondary
            .mock("GET", "/orders")
            .match_header("authorization", "Bearer test-token-2")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let (forwarder, source) = forwarder();
        let resp = forwarder
            .forward(
                &route(&primary.url(), Some(&secondary.url())),
                get("/foxycart/orders", None),
            )
            .await
            .unwrap();

        backup.assert_async().await;
        assert_eq!(resp.target, Target::Secondary);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transform_is_applied_to_success_body() {
        let mut primary = Server::new_async().await;
        primary
            .mock("GET", "/customers/7/subscriptions")
            .with_status(200)
            .with_header("content-type", "application/hal+json")
            .with_header("etag", "\"v1\"")
            .with_body(
                r#"{"_embedded": {"fx:subscriptions": [{"id": 1, "is_active": true}, {"id": 2, "is_active": false}]}}"#,
            )
            .create_async()
            .await;

        let mut route = route(&primary.url(), None);
        route.transform = ResponseTransform::FilterEmbedded {
            rel: "fx:subscriptions".into(),
            field: "is_active".into(),
            equals: json!(true),
        };

        let (forwarder, _) = forwarder();
        let resp = forwarder
            .forward(&route, get("/foxycart/customers/7/subscriptions", None))
            .await
            .unwrap();

        assert_eq!(resp.body, Some(json!([{"id": 1, "is_active": true}])));
        assert!(resp.headers.get(CONTENT_TYPE).is_none());
        assert!(resp.headers.get(ETAG).is_none());
    }
}
