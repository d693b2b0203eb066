//! Snapshot cache.
//!
//! - [`cache_model`] - The published snapshot, update history and stats
//! - [`cache_schema`] - Payload validation applied before any merge
//! - [`cache_service`] - [`SnapshotCache`], the mutable store behind the snapshot
//!
//! Every update is validated first. A rejected payload leaves the cache
//! untouched, and an accepted one only bumps history and timestamps when a
//! field actually changed.

pub mod cache_model;
pub mod cache_schema;
pub mod cache_service;


pub use cache_model::{
    CacheCleanupReport, CacheConfig, CacheMemoryInfo, CacheSnapshot, CacheStats,
    DataAvailability, UpdateHistoryEntry,
};
pub use cache_schema::{parse_payload, validate_payload};
pub use cache_service::SnapshotCache;
