//! Artifact store on the local filesystem.
//!
//! Layout: `<root>/<tier>/<YYYY>_<MM>_<DD>_<HH>:<MM>:<SS>__<entity>.tar.gz`, one
//! directory per active tier. An artifact's creation time is its mtime.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ConfigError;
use tokio::fs;
use tracing::debug;

use crate::artifact::{Artifact, Entity, belongs_to};
use crate::collaborator::ArtifactStore;
use crate::error::CollaboratorError;
use crate::tier::{TierCatalog, TierName};

/// File created and removed to prove the backup root is writable.
const WRITE_PROBE: &str = ".dumprotate-write-probe";

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn check_root_writable(&self) -> Result<(), ConfigError> {
        let metadata = match fs::metadata(&self.root).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::BackupDirMissing(self.root.clone()));
            }
            Err(_) => return Err(ConfigError::BackupDirNotWritable(self.root.clone())),
        };
        if !metadata.is_dir() {
            return Err(ConfigError::BackupDirNotDirectory(self.root.clone()));
        }

        let probe = self.root.join(WRITE_PROBE);
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&probe)
            .await
            .map_err(|_| ConfigError::BackupDirNotWritable(self.root.clone()))?;
        fs::remove_file(&probe)
            .await
            .map_err(|_| ConfigError::BackupDirNotWritable(self.root.clone()))?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn tier_dir(&self, tier: TierName) -> PathBuf {
        self.root.join(tier.as_str())
    }

    async fn prepare_tier_dirs(&self, catalog: &TierCatalog) -> Result<Vec<PathBuf>, ConfigError> {
        self.check_root_writable().await?;

        let mut created = Vec::new();
        for tier in catalog.iter() {
            let dir = self.tier_dir(tier.name);
            if fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
                continue;
            }
            fs::create_dir(&dir)
                .await
                .map_err(|source| ConfigError::TierDirNotWritable {
                    path: dir.clone(),
                    source,
                })?;
            created.push(dir);
        }
        Ok(created)
    }

    async fn list(
        &self,
        entity: &Entity,
        tier: TierName,
    ) -> Result<Vec<Artifact>, CollaboratorError> {
        let dir = self.tier_dir(tier);
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| CollaboratorError::io("list", &dir, e))?;

        let mut artifacts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CollaboratorError::io("list", &dir, e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !belongs_to(name, entity.name()) {
                continue;
            }

            let path = entry.path();
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| CollaboratorError::io("list", &path, e))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|e| CollaboratorError::io("list", &path, e))?;

            artifacts.push(Artifact {
                path,
                entity: entity.name().to_string(),
                tier,
                created_at: DateTime::<Utc>::from(modified),
            });
        }
        Ok(artifacts)
    }

    async fn duplicate(&self, source: &Artifact, target: &Path) -> Result<(), CollaboratorError> {
        debug!(source = %source, target = %target.display(), "Copying artifact");
        fs::copy(&source.path, target)
            .await
            .map_err(|e| CollaboratorError::io("duplicate", target, e))?;
        Ok(())
    }

    async fn delete(&self, artifact: &Artifact) -> Result<(), CollaboratorError> {
        debug!(path = %artifact, "Removing artifact");
        fs::remove_file(&artifact.path)
            .await
            .map_err(|e| CollaboratorError::io("delete", &artifact.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::artifact_file_name;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 10, 0, 0).unwrap()
    }

    async fn write_artifact(store: &LocalArtifactStore, tier: TierName, day: u32, entity: &str) {
        let path = store
            .tier_dir(tier)
            .join(artifact_file_name(&ts(day), entity));
        fs::write(path, b"dump").await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_creates_only_active_tiers() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path());
        let catalog: TierCatalog = "0,7,4,12,-1".parse().unwrap();

        let created = store.prepare_tier_dirs(&catalog).await.unwrap();

        assert_eq!(created.len(), 4);
        for name in ["daily", "weekly", "monthly", "yearly"] {
            assert!(temp_dir.path().join(name).is_dir(), "{name}");
        }
        assert!(!temp_dir.path().join("hourly").exists());
        assert!(!temp_dir.path().join(WRITE_PROBE).exists());

        // Second bootstrap finds everything in place.
        assert!(store.prepare_tier_dirs(&catalog).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path().join("nope"));
        let catalog: TierCatalog = "1,1,1,1,1".parse().unwrap();

        let err = store.prepare_tier_dirs(&catalog).await.unwrap_err();
        assert!(matches!(err, ConfigError::BackupDirMissing(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_entity() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path());
        store
            .prepare_tier_dirs(&"0,7,0,0,0".parse().unwrap())
            .await
            .unwrap();

        write_artifact(&store, TierName::Daily, 1, "app").await;
        write_artifact(&store, TierName::Daily, 2, "app").await;
        write_artifact(&store, TierName::Daily, 2, "myapp").await;
        fs::write(store.tier_dir(TierName::Daily).join("README"), b"x")
            .await
            .unwrap();

        let artifacts = store
            .list(&Entity::new("app"), TierName::Daily)
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(|a| a.entity == "app"));
        assert!(artifacts.iter().all(|a| a.tier == TierName::Daily));
    }

    #[tokio::test]
    async fn test_list_missing_tier_dir_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path());

        let result = store.list(&Entity::new("app"), TierName::Weekly).await;
        assert!(matches!(
            result,
            Err(CollaboratorError::Io {
                operation: "list",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(temp_dir.path());
        store
            .prepare_tier_dirs(&"0,7,4,0,0".parse().unwrap())
            .await
            .unwrap();
        write_artifact(&store, TierName::Daily, 3, "app").await;

        let source = store
            .list(&Entity::new("app"), TierName::Daily)
            .await
            .unwrap()
            .remove(0);
        let target = store
            .tier_dir(TierName::Weekly)
            .join(artifact_file_name(&ts(3), "app"));

        store.duplicate(&source, &target).await.unwrap();
        assert_eq!(fs::read(&target).await.unwrap(), b"dump");

        store.delete(&source).await.unwrap();
        assert!(!source.path.exists());

        let err = store.delete(&source).await.unwrap_err();
        assert_eq!(err.operation(), "delete");
    }
}
