//! Rotation Metrics
//!
//! Counters for one or more rotation runs, shared by the driver, the
//! inventory accessor and the enforcer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

/// Thread-safe counters for rotation operations
#[derive(Debug, Clone)]
pub struct RotationMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Entities that went through a rotation cycle
    entities_processed: AtomicUsize,
    /// Entities skipped because they are excluded
    entities_excluded: AtomicUsize,
    /// Dumps produced (primary artifacts)
    dumps_produced: AtomicUsize,
    /// Primary artifacts copied into another tier
    duplicates_created: AtomicUsize,
    /// Tier decisions that were not due
    tiers_skipped: AtomicUsize,
    /// Artifacts removed by retention enforcement
    artifacts_deleted: AtomicUsize,
    /// Listing failures treated as empty inventories
    listing_failures: AtomicUsize,
}

impl Default for RotationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn record_entity_processed(&self) {
        self.inner.entities_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entity_excluded(&self) {
        self.inner.entities_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dump_produced(&self) {
        self.inner.dumps_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_created(&self) {
        self.inner.duplicates_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tier_skipped(&self) {
        self.inner.tiers_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_artifact_deleted(&self) {
        self.inner.artifacts_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listing_failure(&self) {
        self.inner.listing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            entities_processed: self.inner.entities_processed.load(Ordering::Relaxed),
            entities_excluded: self.inner.entities_excluded.load(Ordering::Relaxed),
            dumps_produced: self.inner.dumps_produced.load(Ordering::Relaxed),
            duplicates_created: self.inner.duplicates_created.load(Ordering::Relaxed),
            tiers_skipped: self.inner.tiers_skipped.load(Ordering::Relaxed),
            artifacts_deleted: self.inner.artifacts_deleted.load(Ordering::Relaxed),
            listing_failures: self.inner.listing_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RotationMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub entities_processed: usize,
    pub entities_excluded: usize,
    pub dumps_produced: usize,
    pub duplicates_created: usize,
    pub tiers_skipped: usize,
    pub artifacts_deleted: usize,
    pub listing_failures: usize,
}

impl MetricsSummary {
    /// Log the metrics summary
    pub fn log(&self) {
        info!(
            entities_processed = self.entities_processed,
            entities_excluded = self.entities_excluded,
            "Rotation summary: entities"
        );
        info!(
            dumps_produced = self.dumps_produced,
            duplicates_created = self.duplicates_created,
            tiers_skipped = self.tiers_skipped,
            "Rotation summary: artifacts"
        );
        info!(
            artifacts_deleted = self.artifacts_deleted,
            listing_failures = self.listing_failures,
            "Rotation summary: retention"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = RotationMetrics::new();
        assert_eq!(metrics.summary(), MetricsSummary::default());
    }

    #[test]
    fn test_metrics_increment() {
        let metrics = RotationMetrics::new();

        metrics.record_entity_processed();
        metrics.record_entity_excluded();
        metrics.record_dump_produced();
        metrics.record_duplicate_created();
        metrics.record_duplicate_created();
        metrics.record_tier_skipped();
        metrics.record_artifact_deleted();
        metrics.record_listing_failure();

        let summary = metrics.summary();
        assert_eq!(summary.entities_processed, 1);
        assert_eq!(summary.entities_excluded, 1);
        assert_eq!(summary.dumps_produced, 1);
        assert_eq!(summary.duplicates_created, 2);
        assert_eq!(summary.tiers_skipped, 1);
        assert_eq!(summary.artifacts_deleted, 1);
        assert_eq!(summary.listing_failures, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = RotationMetrics::new();
        let clone = metrics.clone();

        clone.record_dump_produced();
        assert_eq!(metrics.summary().dumps_produced, 1);
    }
}
