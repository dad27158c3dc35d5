//! Rotation Decision Engine.
//!
//! For one entity and one active tier, decides whether the tier is due and,
//! if so, whether a new dump is needed or the artifact already produced for a
//! faster tier in the same pass can be copied.

use chrono::{DateTime, TimeDelta, Utc};

use crate::artifact::{Artifact, Entity};
use crate::inventory::TierInventory;
use crate::tier::RetentionTier;

/// Why a tier needs a new artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueReason {
    /// Unlimited tiers take an artifact on every run, whatever the age of the newest one.
    Unlimited,
    /// The tier holds nothing for this entity yet.
    EmptyInventory,
    /// The newest artifact is at least one cadence old.
    CadenceElapsed { age: TimeDelta },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The newest artifact is still fresh.
    Skip { age: TimeDelta },
    /// Run a dump; the result becomes the cycle's primary artifact.
    ProduceNew { reason: DueReason },
    /// Copy the cycle's primary artifact into this tier.
    DuplicateFrom { source: Artifact, reason: DueReason },
}

impl Decision {
    pub fn is_due(&self) -> bool {
        !matches!(self, Decision::Skip { .. })
    }
}

/// One entity's traversal of all active tiers in one run.
///
/// Holds the decision time of the run and at most one primary artifact.
#[derive(Debug, Clone)]
pub struct RotationCycle {
    entity: Entity,
    now: DateTime<Utc>,
    primary: Option<Artifact>,
}

impl RotationCycle {
    pub fn new(entity: Entity, now: DateTime<Utc>) -> Self {
        Self {
            entity,
            now,
            primary: None,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn primary(&self) -> Option<&Artifact> {
        self.primary.as_ref()
    }

    /// Remember the artifact produced by a dump in this cycle.
    ///
    /// Only the first call has an effect; later tiers always copy that one.
    pub fn record_primary(&mut self, artifact: Artifact) {
        if self.primary.is_none() {
            self.primary = Some(artifact);
        }
    }
}

/// Whether `tier` is due given its inventory, or the age of its newest artifact if not.
pub fn due_reason(
    tier: &RetentionTier,
    inventory: &TierInventory,
    now: DateTime<Utc>,
) -> Result<DueReason, TimeDelta> {
    if tier.is_unlimited() {
        return Ok(DueReason::Unlimited);
    }

    let Some(newest) = inventory.newest() else {
        return Ok(DueReason::EmptyInventory);
    };

    let age = now - newest.created_at;
    let cadence = TimeDelta::from_std(tier.cadence).unwrap_or(TimeDelta::MAX);
    if age >= cadence {
        Ok(DueReason::CadenceElapsed { age })
    } else {
        Err(age)
    }
}

/// Decide what to do for `tier` in the current cycle.
pub fn decide(tier: &RetentionTier, inventory: &TierInventory, cycle: &RotationCycle) -> Decision {
    match due_reason(tier, inventory, cycle.now()) {
        Err(age) => Decision::Skip { age },
        Ok(reason) => match cycle.primary() {
            Some(primary) => Decision::DuplicateFrom {
                source: primary.clone(),
                reason,
            },
            None => Decision::ProduceNew { reason },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierName;
    use chrono::TimeZone;
    use common::KeepCount;
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn artifact(tier: TierName, created_at: DateTime<Utc>) -> Artifact {
        Artifact {
            path: PathBuf::from(format!("/bck/{tier}/{}__app.tar.gz", created_at.timestamp())),
            entity: "app".to_string(),
            tier,
            created_at,
        }
    }

    fn inventory_aged(tier: TierName, age: TimeDelta) -> TierInventory {
        TierInventory::from_unsorted(tier, vec![artifact(tier, now() - age)])
    }

    fn daily(keep: KeepCount) -> RetentionTier {
        RetentionTier::new(TierName::Daily, keep)
    }

    #[test]
    fn test_empty_inventory_is_due() {
        let cycle = RotationCycle::new(Entity::new("app"), now());
        let decision = decide(
            &daily(KeepCount::Limited(7)),
            &TierInventory::empty(TierName::Daily),
            &cycle,
        );

        assert_eq!(
            decision,
            Decision::ProduceNew {
                reason: DueReason::EmptyInventory
            }
        );
    }

    #[test]
    fn test_fresh_inventory_is_skipped() {
        let cycle = RotationCycle::new(Entity::new("app"), now());
        let inventory = inventory_aged(TierName::Daily, TimeDelta::hours(23));

        let decision = decide(&daily(KeepCount::Limited(7)), &inventory, &cycle);
        assert_eq!(
            decision,
            Decision::Skip {
                age: TimeDelta::hours(23)
            }
        );
        assert!(!decision.is_due());
    }

    #[test]
    fn test_cadence_boundary_is_due() {
        let cycle = RotationCycle::new(Entity::new("app"), now());
        let inventory = inventory_aged(TierName::Daily, TimeDelta::days(1));

        let decision = decide(&daily(KeepCount::Limited(7)), &inventory, &cycle);
        assert_eq!(
            decision,
            Decision::ProduceNew {
                reason: DueReason::CadenceElapsed {
                    age: TimeDelta::days(1)
                }
            }
        );
    }

    #[test]
    fn test_future_artifact_is_skipped() {
        let cycle = RotationCycle::new(Entity::new("app"), now());
        let inventory = inventory_aged(TierName::Daily, TimeDelta::hours(-2));

        let decision = decide(&daily(KeepCount::Limited(7)), &inventory, &cycle);
        assert!(!decision.is_due());
    }

    #[test]
    fn test_unlimited_tier_is_always_due() {
        let cycle = RotationCycle::new(Entity::new("app"), now());
        let yearly = RetentionTier::new(TierName::Yearly, KeepCount::Unlimited);
        let inventory = inventory_aged(TierName::Yearly, TimeDelta::seconds(1));

        assert_eq!(
            decide(&yearly, &inventory, &cycle),
            Decision::ProduceNew {
                reason: DueReason::Unlimited
            }
        );
    }

    #[test]
    fn test_due_tier_duplicates_cycle_primary() {
        let mut cycle = RotationCycle::new(Entity::new("app"), now());
        let primary = artifact(TierName::Daily, now());
        cycle.record_primary(primary.clone());

        let weekly = RetentionTier::new(TierName::Weekly, KeepCount::Limited(4));
        let decision = decide(&weekly, &TierInventory::empty(TierName::Weekly), &cycle);

        assert_eq!(
            decision,
            Decision::DuplicateFrom {
                source: primary,
                reason: DueReason::EmptyInventory
            }
        );
    }

    #[test]
    fn test_skip_ignores_cycle_primary() {
        let mut cycle = RotationCycle::new(Entity::new("app"), now());
        cycle.record_primary(artifact(TierName::Hourly, now()));

        let inventory = inventory_aged(TierName::Daily, TimeDelta::hours(1));
        assert!(!decide(&daily(KeepCount::Limited(7)), &inventory, &cycle).is_due());
    }

    #[test]
    fn test_primary_is_recorded_once() {
        let mut cycle = RotationCycle::new(Entity::new("app"), now());
        let first = artifact(TierName::Hourly, now());
        cycle.record_primary(first.clone());
        cycle.record_primary(artifact(TierName::Daily, now()));

        assert_eq!(cycle.primary(), Some(&first));
    }
}
