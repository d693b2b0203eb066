//! Outbound snapshot delivery.

mod sink;

pub use sink::{BroadcastSink, MockBroadcastSink, NoOpBroadcastSink};
