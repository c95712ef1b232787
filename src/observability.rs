//! Metrics hooks for wire construction and behavior resolution.

/// Observer for wiring activity.
///
/// All methods default to no-ops; implement the ones you care about.
pub trait WireMetrics: Send + Sync {
    /// A new wire was stored for a receiver.
    fn record_wire_created(&self, _wrapper_name: &str) {}

    /// An existing wire was handed back for a receiver.
    fn record_wire_reused(&self, _wrapper_name: &str) {}

    /// A behavior name resolved on a wire.
    fn record_behavior_resolved(&self, _name: &str) {}

    /// A behavior name did not resolve.
    fn record_behavior_missing(&self, _name: &str) {}

    /// A sweep over the side-table finished, dropping `purged` dead entries.
    fn record_purge(&self, _wrapper_name: &str, _purged: usize) {}
}

/// Default metrics sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl WireMetrics for NoOpMetrics {}
