//! Tier Catalog: the ordered set of active retention tiers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use common::config::{KeepCount, KeepSchedule};

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// Name of a retention tier. Doubles as the tier's directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TierName {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl TierName {
    /// All tiers in catalog order, fastest cadence first.
    pub const ALL: [TierName; 5] = [
        TierName::Hourly,
        TierName::Daily,
        TierName::Weekly,
        TierName::Monthly,
        TierName::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::Hourly => "hourly",
            TierName::Daily => "daily",
            TierName::Weekly => "weekly",
            TierName::Monthly => "monthly",
            TierName::Yearly => "yearly",
        }
    }

    /// Minimum age of the newest artifact before the tier is due again.
    pub fn cadence(&self) -> Duration {
        match self {
            TierName::Hourly => Duration::from_secs(HOUR),
            TierName::Daily => Duration::from_secs(DAY),
            TierName::Weekly => Duration::from_secs(7 * DAY),
            TierName::Monthly => Duration::from_secs(30 * DAY),
            // 365.25 days
            TierName::Yearly => Duration::from_secs(365 * DAY + 6 * HOUR),
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TierName::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| format!("unknown tier: {s}"))
    }
}

/// An active tier: name, cadence threshold and keep-count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionTier {
    pub name: TierName,
    pub cadence: Duration,
    pub keep: KeepCount,
}

impl RetentionTier {
    pub fn new(name: TierName, keep: KeepCount) -> Self {
        Self {
            name,
            cadence: name.cadence(),
            keep,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.keep.is_unlimited()
    }
}

/// Immutable, cadence-ordered list of the tiers that take part in rotation.
///
/// Tiers whose keep-count is zero are dropped here and never seen again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    tiers: Vec<RetentionTier>,
}

impl TierCatalog {
    pub fn new(schedule: &KeepSchedule) -> Self {
        let tiers = TierName::ALL
            .into_iter()
            .zip(schedule.counts().iter().copied())
            .filter(|(_, keep)| !keep.is_disabled())
            .map(|(name, keep)| RetentionTier::new(name, keep))
            .collect();
        Self { tiers }
    }

    pub fn tiers(&self) -> &[RetentionTier] {
        &self.tiers
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetentionTier> {
        self.tiers.iter()
    }

    pub fn get(&self, name: TierName) -> Option<&RetentionTier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }
}

impl FromStr for TierCatalog {
    type Err = common::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TierCatalog::new(&s.parse()?))
    }
}
