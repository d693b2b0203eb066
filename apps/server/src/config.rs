use std::{net::SocketAddr, str::FromStr, time::Duration};

use btcpulse_core::constants::MAX_HISTORY_ENTRIES;
use btcpulse_core::scheduler::SchedulerConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub scheduler: SchedulerConfig,
    pub history_size: usize,
    /// Period of the unconditional snapshot re-broadcast to connected clients.
    pub rebroadcast_interval: Duration,
    pub event_buffer: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or(key, default.as_secs()))
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_or(key, default.as_millis() as u64))
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("BTCPULSE_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid BTCPULSE_LISTEN_ADDR");
        let cors_allow = std::env::var("BTCPULSE_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = env_or("BTCPULSE_REQUEST_TIMEOUT_MS", 30_000);

        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            market_interval: env_secs("BTCPULSE_MARKET_INTERVAL_SECS", defaults.market_interval),
            ohlc_interval: env_secs("BTCPULSE_OHLC_INTERVAL_SECS", defaults.ohlc_interval),
            blockchain_interval: env_secs(
                "BTCPULSE_BLOCKCHAIN_INTERVAL_SECS",
                defaults.blockchain_interval,
            ),
            supply_interval: env_secs("BTCPULSE_SUPPLY_INTERVAL_SECS", defaults.supply_interval),
            global_interval: env_secs("BTCPULSE_GLOBAL_INTERVAL_SECS", defaults.global_interval),
            boot_stagger: env_millis("BTCPULSE_BOOT_STAGGER_MS", defaults.boot_stagger),
            broadcast_throttle: env_millis(
                "BTCPULSE_BROADCAST_THROTTLE_MS",
                defaults.broadcast_throttle,
            ),
            ..defaults
        };

        Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            scheduler,
            history_size: env_or("BTCPULSE_HISTORY_SIZE", MAX_HISTORY_ENTRIES),
            rebroadcast_interval: env_secs(
                "BTCPULSE_REBROADCAST_INTERVAL_SECS",
                Duration::from_secs(60),
            ),
            event_buffer: env_or("BTCPULSE_EVENT_BUFFER", 64),
        }
    }
}
