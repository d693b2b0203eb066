//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Per-category priority lists, rotation and fallback
//! - Request spacing and retry-with-backoff per provider
//! - Health tracking with overflow-safe counters
//! - Payload validation

mod health;
mod manager;
mod rate_limiter;
mod retry_policy;
mod validator;

pub use health::{
    rescale_counters, AdapterHealth, HealthConfig, HealthTracker, DEFAULT_COUNTER_CEILING,
    DEFAULT_RESCALE_BASE, DEFAULT_RESCALE_THRESHOLD, DEFAULT_UNHEALTHY_THRESHOLD,
};
pub use manager::{
    default_priorities, ProviderCleanupReport, ProviderHealthReport, ProviderManager,
    ProviderStatus,
};
pub use rate_limiter::RateLimiter;
pub use retry_policy::RetryPolicy;
pub use validator::{PayloadValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
