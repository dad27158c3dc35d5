use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ConfigError;

use super::FixedClock;
use crate::artifact::{Artifact, Entity, artifact_path};
use crate::collaborator::{ArtifactStore, Clock, DumpProducer, EntityLister};
use crate::driver::Collaborators;
use crate::error::CollaboratorError;
use crate::tier::{TierCatalog, TierName};

const ROOT: &str = "/memory";

#[derive(Debug, Default)]
struct State {
    entities: Vec<Entity>,
    artifacts: BTreeMap<PathBuf, Artifact>,
    tier_dirs: HashSet<PathBuf>,
    dump_calls: Vec<String>,
    failing_dumps: HashMap<String, i32>,
    failing_listings: HashSet<TierName>,
    failing_duplicate: Option<i32>,
    failing_delete: Option<i32>,
}

/// Entity lister, dump producer and artifact store backed by a map.
///
/// New artifacts are stamped with the shared [`FixedClock`].
#[derive(Debug)]
pub struct InMemoryBackend {
    clock: FixedClock,
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new(clock: FixedClock, entities: &[&str]) -> Self {
        let state = State {
            entities: entities.iter().map(|name| Entity::new(*name)).collect(),
            ..Default::default()
        };
        Self {
            clock,
            state: Mutex::new(state),
        }
    }

    /// All collaborators of a run, served by this backend and its clock.
    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            entities: self.clone(),
            producer: self.clone(),
            store: self.clone(),
            clock: Arc::new(self.clock.clone()),
        }
    }

    /// Add an existing artifact created at `created_at`.
    pub fn seed(&self, tier: TierName, entity: &str, created_at: DateTime<Utc>) -> Artifact {
        let artifact = Artifact {
            path: artifact_path(&self.tier_dir(tier), &created_at, entity),
            entity: entity.to_string(),
            tier,
            created_at,
        };
        self.state()
            .artifacts
            .insert(artifact.path.clone(), artifact.clone());
        artifact
    }

    /// Artifacts of `entity` in `tier`, newest first.
    pub fn artifacts(&self, tier: TierName, entity: &str) -> Vec<Artifact> {
        let mut artifacts: Vec<Artifact> = self
            .state()
            .artifacts
            .values()
            .filter(|a| a.tier == tier && a.entity == entity)
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        artifacts
    }

    /// Entities a dump was requested for, in call order.
    pub fn dump_calls(&self) -> Vec<String> {
        self.state().dump_calls.clone()
    }

    /// Tier directories created so far.
    pub fn tier_dirs(&self) -> HashSet<PathBuf> {
        self.state().tier_dirs.clone()
    }

    /// Make dumps of `entity` exit with `status`.
    pub fn fail_dump(&self, entity: &str, status: i32) {
        self.state()
            .failing_dumps
            .insert(entity.to_string(), status);
    }

    /// Make listings of `tier` fail.
    pub fn fail_listing(&self, tier: TierName) {
        self.state().failing_listings.insert(tier);
    }

    /// Make every duplication exit with `status`.
    pub fn fail_duplicate(&self, status: i32) {
        self.state().failing_duplicate = Some(status);
    }

    /// Make every deletion exit with `status`.
    pub fn fail_delete(&self, status: i32) {
        self.state().failing_delete = Some(status);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("backend lock poisoned")
    }

    fn store_new(&self, entity: &str, target: &Path) -> Result<(), CollaboratorError> {
        let tier = target
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<TierName>().ok())
            .ok_or_else(|| CollaboratorError::Unavailable {
                operation: "store",
                message: format!("{} is not inside a tier directory", target.display()),
            })?;

        let artifact = Artifact {
            path: target.to_path_buf(),
            entity: entity.to_string(),
            tier,
            created_at: self.clock.now(),
        };
        self.state().artifacts.insert(artifact.path.clone(), artifact);
        Ok(())
    }
}

#[async_trait]
impl EntityLister for InMemoryBackend {
    async fn list_entities(&self) -> Result<Vec<Entity>, CollaboratorError> {
        Ok(self.state().entities.clone())
    }
}

#[async_trait]
impl DumpProducer for InMemoryBackend {
    async fn produce(&self, entity: &Entity, target: &Path) -> Result<(), CollaboratorError> {
        let failure = {
            let mut state = self.state();
            state.dump_calls.push(entity.name().to_string());
            state.failing_dumps.get(entity.name()).copied()
        };

        if let Some(status) = failure {
            return Err(CollaboratorError::Exited {
                operation: "dump",
                command: format!("dump {entity}"),
                status: Some(status),
            });
        }
        self.store_new(entity.name(), target)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryBackend {
    fn tier_dir(&self, tier: TierName) -> PathBuf {
        Path::new(ROOT).join(tier.as_str())
    }

    async fn prepare_tier_dirs(&self, catalog: &TierCatalog) -> Result<Vec<PathBuf>, ConfigError> {
        let dirs: Vec<PathBuf> = catalog.iter().map(|t| self.tier_dir(t.name)).collect();
        let mut state = self.state();
        Ok(dirs
            .into_iter()
            .filter(|dir| state.tier_dirs.insert(dir.clone()))
            .collect())
    }

    async fn list(
        &self,
        entity: &Entity,
        tier: TierName,
    ) -> Result<Vec<Artifact>, CollaboratorError> {
        if self.state().failing_listings.contains(&tier) {
            return Err(CollaboratorError::Exited {
                operation: "list",
                command: format!("ls {}", self.tier_dir(tier).display()),
                status: Some(1),
            });
        }
        Ok(self.artifacts(tier, entity.name()))
    }

    async fn duplicate(&self, source: &Artifact, target: &Path) -> Result<(), CollaboratorError> {
        if let Some(status) = self.state().failing_duplicate {
            return Err(CollaboratorError::Exited {
                operation: "duplicate",
                command: format!("cp {} {}", source.path.display(), target.display()),
                status: Some(status),
            });
        }
        if !self.state().artifacts.contains_key(&source.path) {
            return Err(CollaboratorError::io(
                "duplicate",
                source.path.clone(),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        self.store_new(&source.entity, target)
    }

    async fn delete(&self, artifact: &Artifact) -> Result<(), CollaboratorError> {
        let mut state = self.state();
        if let Some(status) = state.failing_delete {
            return Err(CollaboratorError::Exited {
                operation: "delete",
                command: format!("rm {}", artifact.path.display()),
                status: Some(status),
            });
        }
        match state.artifacts.remove(&artifact.path) {
            Some(_) => Ok(()),
            None => Err(CollaboratorError::io(
                "delete",
                artifact.path.clone(),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )),
        }
    }
}
