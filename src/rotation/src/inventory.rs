//! Tier Inventory Accessor.
//!
//! Listing is the one tolerant collaborator call: a failed or empty listing is
//! an empty inventory, which makes the tier due.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::artifact::{Artifact, Entity};
use crate::collaborator::ArtifactStore;
use crate::metrics::RotationMetrics;
use crate::tier::TierName;

/// Artifacts of one (entity, tier) pair, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierInventory {
    tier: TierName,
    artifacts: Vec<Artifact>,
}

impl TierInventory {
    pub fn empty(tier: TierName) -> Self {
        Self {
            tier,
            artifacts: Vec::new(),
        }
    }

    /// Build an inventory from artifacts in any order.
    pub fn from_unsorted(tier: TierName, mut artifacts: Vec<Artifact>) -> Self {
        artifacts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.path.cmp(&a.path))
        });
        Self { tier, artifacts }
    }

    /// The inventory as it will look once `artifact` exists.
    pub fn with_pending(&self, artifact: Artifact) -> Self {
        let mut artifacts = Vec::with_capacity(self.artifacts.len() + 1);
        artifacts.push(artifact);
        artifacts.extend(self.artifacts.iter().cloned());
        Self::from_unsorted(self.tier, artifacts)
    }

    pub fn tier(&self) -> TierName {
        self.tier
    }

    pub fn newest(&self) -> Option<&Artifact> {
        self.artifacts.first()
    }

    pub fn oldest(&self) -> Option<&Artifact> {
        self.artifacts.last()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }
}

/// Reads tier inventories through the artifact store.
///
/// Inventories are never cached; every call re-lists, so artifacts created
/// earlier in the same pass are always visible.
#[derive(Clone)]
pub struct InventoryAccessor {
    store: Arc<dyn ArtifactStore>,
    metrics: RotationMetrics,
}

impl InventoryAccessor {
    pub fn new(store: Arc<dyn ArtifactStore>, metrics: RotationMetrics) -> Self {
        Self { store, metrics }
    }

    pub async fn list(&self, entity: &Entity, tier: TierName) -> TierInventory {
        match self.store.list(entity, tier).await {
            Ok(artifacts) => {
                debug!(
                    entity = %entity,
                    tier = %tier,
                    count = artifacts.len(),
                    "Listed tier inventory"
                );
                TierInventory::from_unsorted(tier, artifacts)
            }
            Err(e) => {
                warn!(
                    entity = %entity,
                    tier = %tier,
                    error = %e,
                    "Listing failed, treating tier inventory as empty"
                );
                self.metrics.record_listing_failure();
                TierInventory::empty(tier)
            }
        }
    }
}
