//! Provider manager for per-category rotation and fallback.
//!
//! Each category has its own priority list of providers and a rotation
//! cursor. A fetch always tries the provider under the cursor first and
//! advances the cursor when that succeeds, so consecutive refreshes spread
//! load across providers. On failure the manager walks the rest of the
//! priority list in order, skipping unhealthy providers unless one is the
//! last remaining candidate.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use super::{AdapterHealth, HealthConfig, HealthTracker, PayloadValidator};
use crate::errors::MarketDataError;
use crate::models::{Category, CategoryData, FetchRequest, FetchResult};
use crate::provider::{binance, blockstream, coincap, coingecko, MarketDataProvider};

type ProviderChain = Vec<Arc<dyn MarketDataProvider>>;

/// Default priority lists, best provider first.
pub fn default_priorities() -> HashMap<Category, Vec<&'static str>> {
    HashMap::from([
        (
            Category::Market,
            vec![coingecko::PROVIDER_ID, coincap::PROVIDER_ID, binance::PROVIDER_ID],
        ),
        (Category::Ohlc, vec![coingecko::PROVIDER_ID, binance::PROVIDER_ID]),
        (Category::Blockchain, vec![blockstream::PROVIDER_ID]),
        (Category::Supply, vec![coingecko::PROVIDER_ID, coincap::PROVIDER_ID]),
        (Category::Global, vec![coingecko::PROVIDER_ID]),
    ])
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MaintenanceTimes {
    last_counter_cleanup: DateTime<Utc>,
    last_health_reset: DateTime<Utc>,
}

/// Status of one provider as reported by [`ProviderManager::health_status`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    #[serde(flatten)]
    pub health: AdapterHealth,
    /// Success rate formatted as a percentage, e.g. `"97.50%"`.
    pub success_rate: String,
    pub categories: Vec<Category>,
    /// Minimum spacing between two requests, from the provider's rate limit.
    pub rate_limit_delay_ms: u64,
    pub minutes_since_counter_reset: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealthReport {
    pub providers: BTreeMap<String, ProviderStatus>,
    pub priorities: BTreeMap<Category, Vec<&'static str>>,
    pub last_counter_cleanup: DateTime<Utc>,
    pub last_health_reset: DateTime<Utc>,
}

/// Outcome of an on-demand maintenance pass.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCleanupReport {
    pub counters_rescaled: usize,
    pub providers_reset: Vec<String>,
}

pub struct ProviderManager {
    providers: ProviderChain,
    chains: HashMap<Category, ProviderChain>,
    cursors: Mutex<HashMap<Category, usize>>,
    health: HealthTracker,
    validator: PayloadValidator,
    maintenance: Mutex<MaintenanceTimes>,
}

impl ProviderManager {
    /// Manager with the default priority lists.
    pub fn new(providers: ProviderChain) -> Self {
        Self::with_priorities(providers, &default_priorities(), HealthConfig::default())
    }

    /// Manager with explicit priority lists.
    ///
    /// Entries naming an unknown provider, or one that does not support the
    /// category, are dropped with a warning.
    pub fn with_priorities(
        providers: ProviderChain,
        priorities: &HashMap<Category, Vec<&str>>,
        health_config: HealthConfig,
    ) -> Self {
        let health = HealthTracker::with_config(health_config);
        for provider in &providers {
            health.register(provider.id());
        }

        let mut chains = HashMap::new();
        for category in Category::ALL {
            let mut chain: ProviderChain = Vec::new();
            for id in priorities.get(&category).map(Vec::as_slice).unwrap_or_default() {
                match providers.iter().find(|p| p.id() == *id) {
                    Some(p) if p.capabilities().supports(category) => {
                        if !chain.iter().any(|c| c.id() == p.id()) {
                            chain.push(p.clone());
                        }
                    }
                    Some(_) => warn!(
                        "Provider '{}' listed for {} but does not support it, ignoring",
                        id, category
                    ),
                    None => warn!("Unknown provider '{}' in {} priorities, ignoring", id, category),
                }
            }
            if chain.is_empty() {
                warn!("No providers configured for {}", category);
            }
            chains.insert(category, chain);
        }

        let now = Utc::now();
        Self {
            providers,
            chains,
            cursors: Mutex::new(HashMap::new()),
            health,
            validator: PayloadValidator::new(),
            maintenance: Mutex::new(MaintenanceTimes {
                last_counter_cleanup: now,
                last_health_reset: now,
            }),
        }
    }

    fn lock_cursors(&self) -> MutexGuard<'_, HashMap<Category, usize>> {
        self.cursors.lock().unwrap_or_else(|poisoned| {
            warn!("Provider manager cursor mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_maintenance(&self) -> MutexGuard<'_, MaintenanceTimes> {
        self.maintenance.lock().unwrap_or_else(|poisoned| {
            warn!("Provider manager maintenance mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn chain(&self, category: Category) -> &[Arc<dyn MarketDataProvider>] {
        self.chains.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Provider ids for `category`, in priority order.
    pub fn priorities(&self, category: Category) -> Vec<&'static str> {
        self.chain(category).iter().map(|p| p.id()).collect()
    }

    /// The provider a fetch for `category` would try first.
    pub fn current_provider(&self, category: Category) -> Option<Arc<dyn MarketDataProvider>> {
        let chain = self.chain(category);
        if chain.is_empty() {
            return None;
        }
        let cursor = self.lock_cursors().get(&category).copied().unwrap_or(0);
        Some(chain[cursor % chain.len()].clone())
    }

    fn advance(&self, category: Category) {
        let len = self.chain(category).len();
        if len == 0 {
            return;
        }
        let mut cursors = self.lock_cursors();
        let cursor = cursors.entry(category).or_insert(0);
        *cursor = (*cursor + 1) % len;
    }

    /// Fetch with rotation and fallback.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResult, MarketDataError> {
        let category = request.category();
        let current = self
            .current_provider(category)
            .ok_or(MarketDataError::NoProvidersAvailable { category })?;

        // The current provider is always called, healthy or not, so an
        // unhealthy one can recover through a success.
        let current_id = current.id();
        match self.attempt(&current, request).await {
            Ok(data) => {
                self.advance(category);
                Ok(FetchResult {
                    data,
                    source: current_id.to_string(),
                })
            }
            Err(err) => {
                warn!(
                    "Provider '{}' failed for {}: {}. Falling back",
                    current_id, category, err
                );
                self.fetch_with_fallback(request, Some(current_id), Some(err))
                    .await
            }
        }
    }

    /// Walk the priority list in order, skipping `exclude` (the provider
    /// already tried in this call).
    async fn fetch_with_fallback(
        &self,
        request: FetchRequest,
        exclude: Option<&str>,
        mut last_error: Option<MarketDataError>,
    ) -> Result<FetchResult, MarketDataError> {
        let category = request.category();
        let candidates: Vec<&Arc<dyn MarketDataProvider>> = self
            .chain(category)
            .iter()
            .filter(|p| Some(p.id()) != exclude)
            .collect();

        for (idx, provider) in candidates.iter().enumerate() {
            let is_last = idx + 1 == candidates.len();
            if !is_last && !self.health.is_healthy(provider.id()) {
                debug!("Skipping unhealthy provider '{}' for {}", provider.id(), category);
                continue;
            }

            match self.attempt(provider, request).await {
                Ok(data) => {
                    info!("Fallback provider '{}' served {}", provider.id(), category);
                    return Ok(FetchResult {
                        data,
                        source: provider.id().to_string(),
                    });
                }
                Err(err) => {
                    warn!(
                        "Fallback provider '{}' failed for {}: {}",
                        provider.id(),
                        category,
                        err
                    );
                    last_error = Some(err);
                }
            }
        }

        Err(MarketDataError::AllProvidersFailed {
            category,
            last_error: last_error.map(Box::new),
        })
    }

    /// One provider call with validation and health bookkeeping.
    async fn attempt(
        &self,
        provider: &Arc<dyn MarketDataProvider>,
        request: FetchRequest,
    ) -> Result<CategoryData, MarketDataError> {
        let id = provider.id();
        let result = match provider.fetch(request).await {
            Ok(data) => self.validator.validate(id, &data).map(|_| data),
            Err(err) => Err(err),
        };

        match &result {
            Ok(_) => self.health.record_success(id),
            Err(err) if err.retry_class().penalizes_provider() => {
                self.health.record_failure(id, &err.to_string())
            }
            Err(err) => debug!("Provider '{}' skipped without penalty: {}", id, err),
        }
        result
    }

    /// Rescale large request counters.
    pub fn perform_counter_cleanup(&self) -> usize {
        let rescaled = self.health.rescale_large_counters();
        self.lock_maintenance().last_counter_cleanup = Utc::now();
        if rescaled > 0 {
            info!("Counter cleanup rescaled {} providers", rescaled);
        }
        rescaled
    }

    /// Re-admit unhealthy providers whose last failure is old enough.
    pub fn perform_health_reset(&self) -> Vec<String> {
        let reset = self.health.reset_stale();
        self.lock_maintenance().last_health_reset = Utc::now();
        reset
    }

    /// Run counter cleanup and health reset right away.
    pub fn force_cleanup(&self) -> ProviderCleanupReport {
        ProviderCleanupReport {
            counters_rescaled: self.perform_counter_cleanup(),
            providers_reset: self.perform_health_reset(),
        }
    }

    /// Mark every provider healthy.
    pub fn reset_health(&self) {
        self.health.reset_all();
    }

    pub fn health_status(&self) -> ProviderHealthReport {
        let now = Utc::now();
        let records = self.health.snapshot();

        let providers = self
            .providers
            .iter()
            .filter_map(|p| {
                let health = records.get(p.id())?.clone();
                let status = ProviderStatus {
                    success_rate: format!("{:.2}%", health.success_rate()),
                    categories: p.capabilities().categories.to_vec(),
                    rate_limit_delay_ms: p.rate_limit().min_delay.as_millis() as u64,
                    minutes_since_counter_reset: (now - health.last_counter_reset).num_minutes(),
                    health,
                };
                Some((p.id().to_string(), status))
            })
            .collect();

        let priorities = Category::ALL
            .into_iter()
            .map(|c| (c, self.priorities(c)))
            .collect();

        let times = self.lock_maintenance().clone();
        ProviderHealthReport {
            providers,
            priorities,
            last_counter_cleanup: times.last_counter_cleanup,
            last_health_reset: times.last_health_reset,
        }
    }
}
