//! Request counters for the gate.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated on every resolved request and grant change.
#[derive(Debug, Default)]
pub struct GateMetrics {
    served_by_root: AtomicU64,
    served_by_extension: AtomicU64,
    denied: AtomicU64,
    active_grants: AtomicU64,
}

impl GateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request served because a root covered it.
    pub fn record_served_by_root(&self) {
        self.served_by_root.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request served through the extension allow-list.
    pub fn record_served_by_extension(&self) {
        self.served_by_extension.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a denied request.
    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn grant_opened(&self) {
        self.active_grants.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn grant_closed(&self) {
        // Never wraps below zero.
        let _ = self
            .active_grants
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn served(&self) -> u64 {
        self.served_by_root.load(Ordering::Relaxed)
            + self.served_by_extension.load(Ordering::Relaxed)
    }

    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    pub fn active_grants(&self) -> u64 {
        self.active_grants.load(Ordering::Relaxed)
    }

    /// Get a snapshot of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            served_by_root: self.served_by_root.load(Ordering::Relaxed),
            served_by_extension: self.served_by_extension.load(Ordering::Relaxed),
            denied: self.denied(),
            active_grants: self.active_grants(),
        }
    }
}

/// Counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub served_by_root: u64,
    pub served_by_extension: u64,
    pub denied: u64,
    pub active_grants: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = GateMetrics::new();

        metrics.record_served_by_root();
        metrics.record_served_by_extension();
        metrics.record_denied();
        metrics.grant_opened();
        metrics.grant_closed();
        metrics.grant_closed();

        assert_eq!(metrics.served(), 2);
        assert_eq!(metrics.denied(), 1);
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                served_by_root: 1,
                served_by_extension: 1,
                denied: 1,
                active_grants: 0,
            }
        );
    }
}
