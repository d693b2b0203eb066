//! Refresh scheduler.
//!
//! - [`scheduler_model`] - Cadence configuration and stats/report types
//! - [`in_flight`] - Per-category overlap guard
//! - [`scheduler_service`] - [`Scheduler`], the timer loops and broadcast throttle
//!
//! ```text
//! timers ──► Scheduler::tick ──► ProviderManager::fetch ──► SnapshotCache
//!                                                               │
//!                                          throttle ◄───────────┘
//!                                             │
//!                                             ▼
//!                                       BroadcastSink
//! ```

pub mod in_flight;
pub mod scheduler_model;
pub mod scheduler_service;

pub use in_flight::{InFlightGuard, InFlightSet};
pub use scheduler_model::{
    CategoryStats, CleanupReport, RefreshSummary, SchedulerConfig, SchedulerStats, SkipReason,
    SystemStats, TickOutcome,
};
pub use scheduler_service::Scheduler;
