//! btcpulse core - snapshot cache, refresh scheduler and broadcast sink.
//!
//! The cache holds the latest known value of every published field and
//! accepts validated partial updates. The scheduler drives per-category
//! refreshes through the market-data `ProviderManager` and pushes merged
//! snapshots to a [`BroadcastSink`](events::BroadcastSink).

pub mod cache;
pub mod constants;
pub mod errors;
pub mod events;
pub mod scheduler;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
