//! Retention Enforcer
//!
//! Runs after an artifact has been added to a tier and removes at most one
//! artifact, the oldest, when the tier holds more than its keep-count. A tier
//! that is over-full by more than one converges over several runs.

use std::sync::Arc;

use tracing::info;

use crate::artifact::Artifact;
use crate::collaborator::ArtifactStore;
use crate::error::CollaboratorError;
use crate::inventory::TierInventory;
use crate::metrics::RotationMetrics;
use crate::tier::RetentionTier;

/// The artifact retention would remove from `inventory`, if any.
pub fn select_excess<'a>(
    tier: &RetentionTier,
    inventory: &'a TierInventory,
) -> Option<&'a Artifact> {
    let keep = tier.keep.limit()?;
    if inventory.len() > keep {
        inventory.oldest()
    } else {
        None
    }
}

pub struct RetentionEnforcer {
    store: Arc<dyn ArtifactStore>,
    metrics: RotationMetrics,
    dry_run: bool,
}

impl RetentionEnforcer {
    pub fn new(store: Arc<dyn ArtifactStore>, metrics: RotationMetrics, dry_run: bool) -> Self {
        Self {
            store,
            metrics,
            dry_run,
        }
    }

    /// Trim `inventory`, which already includes the artifact just added.
    ///
    /// Returns the removed artifact. A failed deletion aborts the run.
    pub async fn enforce(
        &self,
        tier: &RetentionTier,
        inventory: &TierInventory,
    ) -> Result<Option<Artifact>, CollaboratorError> {
        let Some(excess) = select_excess(tier, inventory) else {
            return Ok(None);
        };

        if self.dry_run {
            info!(
                tier = %tier.name,
                path = %excess,
                count = inventory.len(),
                keep = %tier.keep,
                "[DRY RUN] Would delete oldest backup"
            );
            return Ok(Some(excess.clone()));
        }

        self.store.delete(excess).await?;
        self.metrics.record_artifact_deleted();

        info!(
            tier = %tier.name,
            path = %excess,
            count = inventory.len(),
            keep = %tier.keep,
            "Deleted {} backup {}",
            tier.name,
            excess
        );

        Ok(Some(excess.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::MockArtifactStore;
    use crate::tier::TierName;
    use chrono::{DateTime, TimeZone, Utc};
    use common::KeepCount;
    use std::path::PathBuf;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn weekly_inventory(days: &[u32]) -> TierInventory {
        let artifacts = days
            .iter()
            .map(|day| Artifact {
                path: PathBuf::from(format!("/bck/weekly/2024_01_{day:02}_00:00:00__app.tar.gz")),
                entity: "app".to_string(),
                tier: TierName::Weekly,
                created_at: at(*day),
            })
            .collect();
        TierInventory::from_unsorted(TierName::Weekly, artifacts)
    }

    fn weekly(keep: KeepCount) -> RetentionTier {
        RetentionTier::new(TierName::Weekly, keep)
    }

    #[test]
    fn test_select_excess_picks_oldest_only_when_over_keep() {
        let tier = weekly(KeepCount::Limited(4));

        assert!(select_excess(&tier, &weekly_inventory(&[1, 8, 15, 22])).is_none());

        let over = weekly_inventory(&[8, 1, 22, 15, 29]);
        assert_eq!(select_excess(&tier, &over).unwrap().created_at, at(1));
    }

    #[test]
    fn test_select_excess_never_touches_unlimited_tiers() {
        let tier = weekly(KeepCount::Unlimited);
        assert!(select_excess(&tier, &weekly_inventory(&[1, 2, 3, 4, 5, 6])).is_none());
    }

    #[tokio::test]
    async fn test_enforce_deletes_single_oldest() {
        let mut store = MockArtifactStore::new();
        store
            .expect_delete()
            .withf(|artifact| artifact.created_at == at(1))
            .times(1)
            .returning(|_| Ok(()));

        let metrics = RotationMetrics::new();
        let enforcer = RetentionEnforcer::new(Arc::new(store), metrics.clone(), false);

        // Keep two, hold five: only one goes per invocation.
        let deleted = enforcer
            .enforce(
                &weekly(KeepCount::Limited(2)),
                &weekly_inventory(&[1, 2, 3, 4, 5]),
            )
            .await
            .unwrap();

        assert_eq!(deleted.unwrap().created_at, at(1));
        assert_eq!(metrics.summary().artifacts_deleted, 1);
    }

    #[tokio::test]
    async fn test_enforce_within_keep_does_nothing() {
        let mut store = MockArtifactStore::new();
        store.expect_delete().never();

        let enforcer = RetentionEnforcer::new(Arc::new(store), RotationMetrics::new(), false);
        let deleted = enforcer
            .enforce(&weekly(KeepCount::Limited(4)), &weekly_inventory(&[1, 2, 3, 4]))
            .await
            .unwrap();

        assert!(deleted.is_none());
    }

    #[tokio::test]
    async fn test_delete_failure_is_propagated() {
        let mut store = MockArtifactStore::new();
        store.expect_delete().returning(|artifact| {
            Err(CollaboratorError::io(
                "delete",
                artifact.path.clone(),
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ))
        });

        let enforcer = RetentionEnforcer::new(Arc::new(store), RotationMetrics::new(), false);
        let result = enforcer
            .enforce(&weekly(KeepCount::Limited(1)), &weekly_inventory(&[1, 2]))
            .await;

        assert!(matches!(
            result,
            Err(CollaboratorError::Io {
                operation: "delete",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_deleting() {
        let mut store = MockArtifactStore::new();
        store.expect_delete().never();

        let metrics = RotationMetrics::new();
        let enforcer = RetentionEnforcer::new(Arc::new(store), metrics.clone(), true);
        let deleted = enforcer
            .enforce(&weekly(KeepCount::Limited(1)), &weekly_inventory(&[1, 2]))
            .await
            .unwrap();

        assert_eq!(deleted.unwrap().created_at, at(1));
        assert_eq!(metrics.summary().artifacts_deleted, 0);
    }
}
