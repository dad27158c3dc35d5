//! Keep-count configuration for the five rotation tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ConfigError;

/// Number of tiers in a keep schedule (hourly, daily, weekly, monthly, yearly).
pub const TIER_COUNT: usize = 5;

/// Textual sentinel for an unlimited keep-count.
pub const UNLIMITED_SENTINEL: &str = "-1";

/// How many artifacts a tier retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeepCount {
    /// Retain at most this many artifacts. `Limited(0)` disables the tier.
    Limited(u32),
    /// Never prune; a new artifact is taken on every run.
    Unlimited,
}

impl KeepCount {
    /// A tier with a keep-count of zero takes no part in rotation.
    pub fn is_disabled(&self) -> bool {
        matches!(self, KeepCount::Limited(0))
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, KeepCount::Unlimited)
    }

    /// The finite limit, or `None` for unlimited tiers.
    pub fn limit(&self) -> Option<usize> {
        match self {
            KeepCount::Limited(n) => Some(*n as usize),
            KeepCount::Unlimited => None,
        }
    }
}

impl FromStr for KeepCount {
    type Err = ConfigError;

    fn from_str(part: &str) -> Result<Self, Self::Err> {
        if part == UNLIMITED_SENTINEL {
            return Ok(KeepCount::Unlimited);
        }
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidKeep(format!(
                "part '{part}' must be a digit"
            )));
        }
        part.parse::<u32>()
            .map(KeepCount::Limited)
            .map_err(|e| ConfigError::InvalidKeep(format!("part '{part}' is out of range: {e}")))
    }
}

impl fmt::Display for KeepCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepCount::Limited(n) => write!(f, "{n}"),
            KeepCount::Unlimited => f.write_str(UNLIMITED_SENTINEL),
        }
    }
}

/// Keep-counts for the five tiers, ordered hourly → yearly.
///
/// Written as a comma-separated string in every configuration layer, e.g.
/// `"0,7,4,12,-1"`: no hourly backups, seven daily, four weekly, twelve monthly
/// and unlimited yearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeepSchedule([KeepCount; TIER_COUNT]);

impl KeepSchedule {
    pub fn new(counts: [KeepCount; TIER_COUNT]) -> Self {
        Self(counts)
    }

    /// Keep-counts in catalog order (hourly first).
    pub fn counts(&self) -> &[KeepCount; TIER_COUNT] {
        &self.0
    }
}

impl FromStr for KeepSchedule {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').collect();
        if parts.len() != TIER_COUNT {
            return Err(ConfigError::InvalidKeep(format!(
                "must consist of {TIER_COUNT} comma-separated values, got {}",
                parts.len()
            )));
        }

        let mut counts = [KeepCount::Limited(0); TIER_COUNT];
        for (slot, part) in counts.iter_mut().zip(parts) {
            *slot = part.parse()?;
        }
        Ok(Self(counts))
    }
}

impl TryFrom<String> for KeepSchedule {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeepSchedule> for String {
    fn from(schedule: KeepSchedule) -> Self {
        schedule.to_string()
    }
}

impl fmt::Display for KeepSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
