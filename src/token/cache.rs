use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use super::source::TokenSource;
use crate::error::{ProxyError, Result};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{CachedToken, TokenResponse};

/// Process-wide holder of the single bearer token slot.
///
/// The slot lock is held across a refresh, so callers that find the token
/// expired while a refresh is in flight wait for it and reuse its result
/// instead of issuing their own.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    default_ttl: Duration,
    slot: Mutex<Option<CachedToken>>,
    metrics: Metrics,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>, default_ttl: Duration, metrics: Metrics) -> Self {
        Self {
            source,
            default_ttl,
            slot: Mutex::new(None),
            metrics,
        }
    }

    /// Returns a bearer token valid at the time of the call, refreshing if needed.
    pub async fn get_token(&self) -> Result<String> {
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.as_ref() {
            if token.is_valid_at(Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    /// Drops the cached token if it is still `rejected`, forcing the next call to refresh.
    pub async fn invalidate(&self, rejected: &str) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|t| t.value == rejected) {
            info!(
                event_name = "token.invalidated",
                event_domain = "token",
                "upstream rejected cached token; next request refreshes"
            );
            *slot = None;
        }
    }

    /// Expiry of the cached token, if any.
    pub async fn expires_at(&self) -> Option<Instant> {
        self.slot.lock().await.as_ref().map(|t| t.expires_at)
    }

    async fn refresh(&self) -> Result<CachedToken> {
        let started = Instant::now();
        let result = self
            .source
            .fetch()
            .await
            .and_then(|resp| self.entry_for(resp, started));
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(token) => {
                self.metrics.record_token_refresh("success", elapsed);
                info!(
                    event_name = "token.refresh.success",
                    event_domain = "token",
                    ttl_seconds = token.expires_at.duration_since(started).as_secs(),
                    "access token refreshed"
                );
                Ok(token)
            }
            Err(e) => {
                self.metrics.record_token_refresh("failure", elapsed);
                warn!(
                    event_name = "token.refresh.failure",
                    event_domain = "token",
                    error = %e,
                    "access token refresh failed"
                );
                Err(e)
            }
        }
    }

    /// Applies `expires_in` (or the default TTL when absent or out of the clock's range).
    fn entry_for(&self, resp: TokenResponse, issued_at: Instant) -> Result<CachedToken> {
        let ttl = resp
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);
        if let Some(token) = CachedToken::new(resp.access_token.clone(), issued_at, ttl) {
            return Ok(token);
        }

        warn!(
            event_name = "token.ttl.out_of_range",
            event_domain = "token",
            expires_in = ttl.as_secs(),
            default_ttl_seconds = self.default_ttl.as_secs(),
            "token lifetime out of range; using default TTL"
        );
        CachedToken::new(resp.access_token, issued_at, self.default_ttl).ok_or_else(|| {
            ProxyError::TokenRefresh {
                status: None,
                body: format!(
                    "Token lifetime of {}s is out of range",
                    self.default_ttl.as_secs()
                ),
            }
        })
    }
}
