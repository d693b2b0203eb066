//! Shared HTTP plumbing for adapters.
//!
//! Every request goes through the provider's rate limiter and retry policy:
//! each attempt first waits for a free slot, then sends. Bodies come back as
//! text so adapters can parse them with their own response models.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::registry::{RateLimiter, RetryPolicy};

use super::RateLimit;

/// Per-request timeout for every provider call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in an `HttpStatus` message.
const MAX_ERROR_BODY: usize = 200;

pub struct ProviderHttp {
    provider: &'static str,
    client: Client,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl ProviderHttp {
    pub fn new(provider: &'static str, rate_limit: &RateLimit) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("btcpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        let limiter = RateLimiter::new();
        limiter.configure(provider, rate_limit.min_delay);

        Self {
            provider,
            client,
            limiter,
            retry: RetryPolicy::from_rate_limit(rate_limit),
        }
    }

    pub async fn get_text(&self, operation: &'static str, url: &str) -> Result<String, MarketDataError> {
        self.execute(operation, |client| client.get(url)).await
    }

    pub async fn post_json<B>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
    ) -> Result<String, MarketDataError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.execute(operation, |client| client.post(url).json(body))
            .await
    }

    async fn execute<F>(&self, operation: &'static str, build: F) -> Result<String, MarketDataError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let provider = self.provider;
        let client = &self.client;
        let limiter = &self.limiter;
        let build = &build;

        self.retry
            .run(provider, operation, || async move {
                limiter.acquire(provider).await;
                debug!("{} {}", provider, operation);
                send(provider, build(client)).await
            })
            .await
    }
}

async fn send(provider: &'static str, request: RequestBuilder) -> Result<String, MarketDataError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            MarketDataError::Network(e)
        }
    })?;

    let status = response.status();

    // Handle rate limiting
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MarketDataError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("error").to_string()
        } else {
            body.chars().take(MAX_ERROR_BODY).collect()
        };
        return Err(MarketDataError::HttpStatus {
            provider: provider.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    response.text().await.map_err(|e| {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            MarketDataError::Network(e)
        }
    })
}

/// Parse a JSON body, reporting failures against `provider`.
pub fn parse_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    what: &str,
    body: &str,
) -> Result<T, MarketDataError> {
    serde_json::from_str(body).map_err(|e| {
        MarketDataError::provider_error(provider, format!("Failed to parse {} response: {}", what, e))
    })
}
