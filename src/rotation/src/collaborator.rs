//! Typed collaborator interfaces consumed by the rotation engine.
//!
//! The engine never talks to a database or a filesystem directly. Entity
//! enumeration, dumping, and artifact listing/copying/deletion are supplied
//! through these traits. Every call is awaited to completion before the next
//! one starts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ConfigError;

#[cfg(test)]
use mockall::automock;

use crate::artifact::{Artifact, Entity};
use crate::error::CollaboratorError;
use crate::tier::{TierCatalog, TierName};

/// Enumerates the entities known to the backing store.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EntityLister: Send + Sync {
    async fn list_entities(&self) -> Result<Vec<Entity>, CollaboratorError>;
}

/// Produces a compressed snapshot of one entity.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DumpProducer: Send + Sync {
    /// Write a fresh snapshot of `entity` to `target`.
    async fn produce(&self, entity: &Entity, target: &Path) -> Result<(), CollaboratorError>;
}

/// Where artifacts live: per-tier directories under a backup root.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Directory holding the artifacts of `tier`.
    fn tier_dir(&self, tier: TierName) -> PathBuf;

    /// Verify the backup root and create a directory for every active tier.
    ///
    /// Returns the directories that had to be created.
    async fn prepare_tier_dirs(&self, catalog: &TierCatalog) -> Result<Vec<PathBuf>, ConfigError>;

    /// Artifacts of `entity` in `tier`, in no particular order.
    async fn list(&self, entity: &Entity, tier: TierName)
    -> Result<Vec<Artifact>, CollaboratorError>;

    /// Byte-copy `source` to `target`.
    async fn duplicate(&self, source: &Artifact, target: &Path) -> Result<(), CollaboratorError>;

    /// Remove one artifact.
    async fn delete(&self, artifact: &Artifact) -> Result<(), CollaboratorError>;
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
