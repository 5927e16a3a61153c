use serde::Deserialize;
use tokio::time::{Duration, Instant};

/// The single bearer token slot held by the token cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: Instant,
}

impl CachedToken {
    /// `None` when `issued_at + ttl` is past what the clock can represent.
    pub fn new(value: String, issued_at: Instant, ttl: Duration) -> Option<Self> {
        issued_at
            .checked_add(ttl)
            .map(|expires_at| CachedToken { value, expires_at })
    }

    /// A token is usable strictly before its expiry instant.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Body returned by an OAuth2 token endpoint for a refresh-token grant.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}
