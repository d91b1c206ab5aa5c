//! Shared HTTP plumbing for JSON and HTML providers

use crate::error::{ProviderError, Result, StockError};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const USER_AGENT: &str = concat!("stock-data/", env!("CARGO_PKG_VERSION"));

/// Rate-limited HTTP client bound to one provider.
///
/// Every request waits for the provider's quota and gives up with
/// [`ProviderError::RateLimited`] if the wait outlasts the request timeout.
#[derive(Debug, Clone)]
pub struct HttpSource {
    provider: String,
    client: Client,
    rate_limiter: SharedRateLimiter,
    timeout: Duration,
    bearer: Option<String>,
}

impl HttpSource {
    pub fn new(
        provider: impl Into<String>,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StockError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rate)));

        Ok(Self {
            provider: provider.into(),
            client,
            rate_limiter,
            timeout,
            bearer: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// GET a URL and decode the body as JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> std::result::Result<T, ProviderError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::malformed(&self.provider, e))
    }

    /// GET a URL and return the raw body
    pub async fn get_text(&self, url: &str) -> std::result::Result<String, ProviderError> {
        tokio::time::timeout(self.timeout, self.rate_limiter.until_ready())
            .await
            .map_err(|_| ProviderError::rate_limited(&self.provider))?;

        tracing::debug!(provider = %self.provider, %url, "GET");

        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(&self.provider, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::status(&self.provider, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::transport(&self.provider, e))
    }
}
