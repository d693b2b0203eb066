//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

use crate::models::Category;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how adapters and the provider manager handle the error.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider does not implement the requested operation.
    /// The manager skips it without a health penalty.
    #[error("Operation '{operation}' is not supported by {provider}")]
    Unsupported {
        operation: &'static str,
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429).
    /// Should retry with exponential backoff.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    /// Should retry with exponential backoff.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// Non-success HTTP status other than 429.
    /// 5xx is treated as transient, everything else fails over.
    #[error("HTTP {status} from {provider}: {message}")]
    HttpStatus {
        provider: String,
        status: u16,
        message: String,
    },

    /// A provider-specific error occurred (missing fields, unexpected body).
    /// Try the next provider in the chain.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// Data validation failed.
    /// The provider returned data that failed validation checks.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// No registered provider is configured for the category.
    #[error("No providers available for {category}")]
    NoProvidersAvailable { category: Category },

    /// All providers were tried and all failed.
    /// Carries the last underlying error when there was one.
    #[error("All providers failed for {category}{}", describe_last_error(.last_error))]
    AllProvidersFailed {
        category: Category,
        last_error: Option<Box<MarketDataError>>,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    pub fn unsupported(operation: &'static str, provider: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            provider: provider.into(),
        }
    }

    pub fn provider_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use btcpulse_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "coingecko".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::unsupported("get_ohlc_data", "coincap");
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient errors - retry with backoff
            Self::RateLimited { .. } | Self::Timeout { .. } => RetryClass::WithBackoff,
            Self::HttpStatus { status, .. } if *status >= 500 => RetryClass::WithBackoff,
            Self::Network(e) if e.is_decode() => RetryClass::FailoverWithPenalty,
            Self::Network(_) => RetryClass::WithBackoff,

            // Bad answers - fail over and count against the provider
            Self::HttpStatus { .. } | Self::ProviderError { .. } | Self::ValidationFailed { .. } => {
                RetryClass::FailoverWithPenalty
            }

            // Provider can't serve the category
            Self::Unsupported { .. } => RetryClass::NextProvider,

            // Exhausted all options - terminal
            Self::NoProvidersAvailable { .. } | Self::AllProvidersFailed { .. } => {
                RetryClass::Never
            }
        }
    }

    /// The underlying provider error for an exhausted fallback chain.
    pub fn last_error(&self) -> Option<&MarketDataError> {
        match self {
            Self::AllProvidersFailed { last_error, .. } => last_error.as_deref(),
            _ => None,
        }
    }
}

fn describe_last_error(last_error: &Option<Box<MarketDataError>>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(": {}", e))
        .unwrap_or_default()
}
