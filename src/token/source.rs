use async_trait::async_trait;
use tracing::debug;

use crate::config::OAuthConfig;
use crate::error::{ProxyError, Result};
use crate::models::TokenResponse;

/// Where the token cache gets fresh access tokens from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<TokenResponse>;
}

/// Exchanges the configured refresh token at an OAuth2 token endpoint.
pub struct OAuthRefreshSource {
    client: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthRefreshSource {
    pub fn new(client: reqwest::Client, config: OAuthConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TokenSource for OAuthRefreshSource {
    async fn fetch(&self) -> Result<TokenResponse> {
        debug!(
            event_name = "token.refresh.request",
            event_domain = "token",
            token_url = self.config.token_url.as_str(),
            "requesting access token with refresh_token grant"
        );

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let resp = self
            .client
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ProxyError::TokenRefresh {
                status: None,
                body: format!("Failed to call token endpoint: {}", e),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ProxyError::TokenRefresh {
            status: Some(status),
            body: format!("Failed to read token response: {}", e),
        })?;

        if !status.is_success() {
            return Err(ProxyError::TokenRefresh {
                status: Some(status),
                body,
            });
        }

        serde_json::from_str::<TokenResponse>(&body).map_err(|e| ProxyError::TokenRefresh {
            status: Some(status),
            body: format!("Malformed token response ({}): {}", e, body),
        })
    }
}
