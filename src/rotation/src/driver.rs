//! Execution Driver
//!
//! Walks every non-excluded entity, then every active tier in catalog order:
//! list → decide → produce or duplicate → re-list → enforce. The first strict
//! collaborator failure aborts the whole run; nothing is rolled back.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use common::ValidatedConfig;
use tracing::{debug, info};

use crate::artifact::{Artifact, Entity, artifact_path};
use crate::collaborator::{ArtifactStore, Clock, DumpProducer, EntityLister};
use crate::decision::{Decision, RotationCycle, decide};
use crate::enforcer::RetentionEnforcer;
use crate::error::{CollaboratorError, Result};
use crate::inventory::{InventoryAccessor, TierInventory};
use crate::metrics::RotationMetrics;
use crate::tier::{RetentionTier, TierCatalog, TierName};

/// The collaborators a run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub entities: Arc<dyn EntityLister>,
    pub producer: Arc<dyn DumpProducer>,
    pub store: Arc<dyn ArtifactStore>,
    pub clock: Arc<dyn Clock>,
}

/// Immutable settings for the driver.
#[derive(Debug, Clone, Default)]
pub struct DriverSettings {
    pub exclude: HashSet<String>,
    pub dry_run: bool,
}

impl From<&ValidatedConfig> for DriverSettings {
    fn from(config: &ValidatedConfig) -> Self {
        Self {
            exclude: config.mysql.exclude.iter().cloned().collect(),
            dry_run: config.dry_run,
        }
    }
}

/// What happened to one tier of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierAction {
    Skipped,
    Produced(PathBuf),
    Duplicated { source: PathBuf, target: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierOutcome {
    pub tier: TierName,
    pub action: TierAction,
    pub deleted: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOutcome {
    pub entity: Entity,
    pub tiers: Vec<TierOutcome>,
}

impl EntityOutcome {
    /// Number of dumps run for this entity; never more than one.
    pub fn dumps(&self) -> usize {
        self.tiers
            .iter()
            .filter(|t| matches!(t.action, TierAction::Produced(_)))
            .count()
    }
}

/// Result of a complete rotation run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    pub excluded: Vec<Entity>,
    pub entities: Vec<EntityOutcome>,
}

pub struct RotationDriver {
    catalog: TierCatalog,
    collaborators: Collaborators,
    settings: DriverSettings,
    inventory: InventoryAccessor,
    enforcer: RetentionEnforcer,
    metrics: RotationMetrics,
}

impl RotationDriver {
    pub fn new(
        catalog: TierCatalog,
        collaborators: Collaborators,
        settings: DriverSettings,
        metrics: RotationMetrics,
    ) -> Self {
        let inventory = InventoryAccessor::new(collaborators.store.clone(), metrics.clone());
        let enforcer = RetentionEnforcer::new(
            collaborators.store.clone(),
            metrics.clone(),
            settings.dry_run,
        );

        Self {
            catalog,
            collaborators,
            settings,
            inventory,
            enforcer,
            metrics,
        }
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &RotationMetrics {
        &self.metrics
    }

    /// Create the tier directories. Skipped in dry-run mode.
    pub async fn bootstrap(&self) -> Result<Vec<PathBuf>> {
        if self.settings.dry_run {
            debug!("[DRY RUN] Skipping tier directory bootstrap");
            return Ok(Vec::new());
        }

        let created = self
            .collaborators
            .store
            .prepare_tier_dirs(&self.catalog)
            .await?;
        for dir in &created {
            info!(path = %dir.display(), "Created directory: {}", dir.display());
        }
        Ok(created)
    }

    /// Run one rotation pass over every entity.
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = self.collaborators.clock.now();

        info!(
            tiers = ?self.catalog.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            dry_run = self.settings.dry_run,
            "Starting rotation run"
        );

        let entities = self.collaborators.entities.list_entities().await?;

        let mut excluded = Vec::new();
        let mut outcomes = Vec::new();
        for entity in entities {
            if entity.is_excluded(&self.settings.exclude) {
                debug!(entity = %entity, "Skipping excluded entity");
                self.metrics.record_entity_excluded();
                excluded.push(entity);
                continue;
            }

            outcomes.push(self.rotate_entity(entity, started_at).await?);
        }

        let completed_at = self.collaborators.clock.now();
        info!(
            entities = outcomes.len(),
            excluded = excluded.len(),
            duration_ms = (completed_at - started_at).num_milliseconds(),
            "Rotation run completed"
        );

        Ok(RunSummary {
            started_at,
            completed_at,
            dry_run: self.settings.dry_run,
            excluded,
            entities: outcomes,
        })
    }

    /// Traverse every active tier for one entity.
    pub async fn rotate_entity(
        &self,
        entity: Entity,
        now: DateTime<Utc>,
    ) -> Result<EntityOutcome> {
        let mut cycle = RotationCycle::new(entity, now);
        let mut tiers = Vec::with_capacity(self.catalog.len());

        for tier in self.catalog.iter() {
            tiers.push(self.rotate_tier(tier, &mut cycle).await?);
        }

        self.metrics.record_entity_processed();
        Ok(EntityOutcome {
            entity: cycle.entity().clone(),
            tiers,
        })
    }

    async fn rotate_tier(
        &self,
        tier: &RetentionTier,
        cycle: &mut RotationCycle,
    ) -> Result<TierOutcome, CollaboratorError> {
        let entity = cycle.entity().clone();
        let inventory = self.inventory.list(&entity, tier.name).await;

        let decision = decide(tier, &inventory, cycle);
        let (artifact, action) = match decision {
            Decision::Skip { age } => {
                debug!(
                    entity = %entity,
                    tier = %tier.name,
                    age_secs = age.num_seconds(),
                    cadence_secs = tier.cadence.as_secs(),
                    "Tier not due"
                );
                self.metrics.record_tier_skipped();
                return Ok(TierOutcome {
                    tier: tier.name,
                    action: TierAction::Skipped,
                    deleted: None,
                });
            }
            Decision::ProduceNew { reason } => {
                let artifact = self.new_artifact(&entity, tier.name);
                debug!(
                    entity = %entity,
                    tier = %tier.name,
                    reason = ?reason,
                    "Tier due, producing dump"
                );

                if self.settings.dry_run {
                    info!(
                        entity = %entity,
                        tier = %tier.name,
                        path = %artifact,
                        "[DRY RUN] Would create {} backup {}",
                        tier.name,
                        artifact
                    );
                } else {
                    self.collaborators
                        .producer
                        .produce(&entity, &artifact.path)
                        .await?;
                    self.metrics.record_dump_produced();
                    info!(
                        entity = %entity,
                        tier = %tier.name,
                        path = %artifact,
                        "Created {} backup {}",
                        tier.name,
                        artifact
                    );
                }

                cycle.record_primary(artifact.clone());
                let action = TierAction::Produced(artifact.path.clone());
                (artifact, action)
            }
            Decision::DuplicateFrom { source, reason } => {
                let artifact = self.new_artifact(&entity, tier.name);
                debug!(
                    entity = %entity,
                    tier = %tier.name,
                    reason = ?reason,
                    source = %source,
                    "Tier due, copying primary"
                );

                if self.settings.dry_run {
                    info!(
                        entity = %entity,
                        tier = %tier.name,
                        path = %artifact,
                        source = %source,
                        "[DRY RUN] Would create {} backup {}",
                        tier.name,
                        artifact
                    );
                } else {
                    self.collaborators
                        .store
                        .duplicate(&source, &artifact.path)
                        .await?;
                    self.metrics.record_duplicate_created();
                    info!(
                        entity = %entity,
                        tier = %tier.name,
                        path = %artifact,
                        source = %source,
                        "Created {} backup {}",
                        tier.name,
                        artifact
                    );
                }

                let action = TierAction::Duplicated {
                    source: source.path.clone(),
                    target: artifact.path.clone(),
                };
                (artifact, action)
            }
        };

        let after = self.inventory_after(&entity, &inventory, artifact).await;
        let deleted = self.enforcer.enforce(tier, &after).await?;

        Ok(TierOutcome {
            tier: tier.name,
            action,
            deleted: deleted.map(|a| a.path),
        })
    }

    /// Inventory once the new artifact exists: re-listed, or simulated in dry-run mode.
    async fn inventory_after(
        &self,
        entity: &Entity,
        before: &TierInventory,
        artifact: Artifact,
    ) -> TierInventory {
        if self.settings.dry_run {
            before.with_pending(artifact)
        } else {
            self.inventory.list(entity, before.tier()).await
        }
    }

    fn new_artifact(&self, entity: &Entity, tier: TierName) -> Artifact {
        let created_at = self.collaborators.clock.now();
        let tier_dir = self.collaborators.store.tier_dir(tier);
        Artifact {
            path: artifact_path(&tier_dir, &created_at.with_timezone(&Local), entity.name()),
            entity: entity.name().to_string(),
            tier,
            created_at,
        }
    }
}
