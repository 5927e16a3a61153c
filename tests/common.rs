#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde_json::Value;
use storefront_proxy::config::{Config, ConfigV1};
use storefront_proxy::routes::create_router;
use storefront_proxy::startup::build_state;

pub const CLIENT_ID: &str = "client_test";
pub const CLIENT_SECRET: &str = "secret_test";
pub const REFRESH_TOKEN: &str = "refresh_test";

/// Config with one FoxyCart-style route and one CRM route filtering active subscriptions.
pub fn build_config(token_url: &str, primary_url: &str, secondary_url: Option<&str>) -> ConfigV1 {
    let secondary = secondary_url
        .map(|url| format!("secondary_url: \"{}\"", url))
        .unwrap_or_default();
    let yaml = format!(
        r#"
version: "1.0.0"
bind_address: 127.0.0.1:0
logging:
  level: "warn"
  format: "json"
oauth:
  token_url: "{token_url}/token"
  client_id: "{CLIENT_ID}"
  client_secret: "{CLIENT_SECRET}"
  refresh_token: "{REFRESH_TOKEN}"
http:
  timeout_in_ms: 2000
cors:
  allow_origins: ["*"]
  extra_allow_headers: ["x-tenant-id"]
routes:
  - name: "foxycart"
    prefix: "/foxycart"
    primary_url: "{primary_url}"
    {secondary}
    api_version_header:
      name: "FOXY-API-VERSION"
      value: "1"
    forward_headers: ["x-tenant-id"]
  - name: "active-subscriptions"
    prefix: "/foxycart-active"
    primary_url: "{primary_url}"
    api_version_header:
      name: "FOXY-API-VERSION"
      value: "1"
    transform:
      type: "filter_embedded"
      rel: "fx:subscriptions"
      field: "is_active"
      equals: true
"#
    );

    let config: Config = Figment::new()
        .merge(Yaml::string(&yaml))
        .extract()
        .expect("Failed to parse integration test config");

    match config {
        Config::ConfigV1(cfg) => cfg,
    }
}

pub fn build_app(config: ConfigV1) -> Router {
    let state = build_state(Arc::new(config)).expect("state should build");
    create_router(state).expect("router should build")
}

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}
