use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::proxy::transform::ResponseTransform;

/// Credentials for the OAuth2 refresh-token grant. Secrets are expected from the environment.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// TTL applied when the token endpoint omits `expires_in`.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

/// Outbound HTTP settings shared by the token endpoint and upstream calls.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_in_ms: default_timeout_in_ms(),
        }
    }
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct CorsConfig {
    /// "*" allows any origin.
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,
    /// Added to `Content-Type, Authorization`.
    #[serde(default)]
    pub extra_allow_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: default_allow_origins(),
            extra_allow_headers: Vec::new(),
        }
    }
}

fn default_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// A fixed header sent on every upstream call of a route, e.g. `FOXY-API-VERSION: 1`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct ApiVersionHeader {
    pub name: String,
    pub value: String,
}

/// One entry of the route table.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct RouteConfig {
    pub name: String,
    /// Inbound path prefix, stripped before forwarding.
    pub prefix: String,
    pub primary_url: String,
    /// Retried once when the primary attempt fails.
    #[serde(default)]
    pub secondary_url: Option<String>,
    #[serde(default)]
    pub api_version_header: Option<ApiVersionHeader>,
    /// Inbound headers copied onto the upstream request (e.g. a tenant-context header).
    #[serde(default)]
    pub forward_headers: Vec<String>,
    #[serde(default)]
    pub transform: ResponseTransform,
}
