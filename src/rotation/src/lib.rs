//! Generational backup rotation.
//!
//! Each run dumps every non-excluded entity into a set of retention tiers
//! (hourly, daily, weekly, monthly, yearly). A tier receives a new artifact
//! once its cadence has elapsed since its newest one; at most one fresh dump
//! is produced per entity per run and every other due tier gets a copy of it.
//! After an addition the oldest artifact beyond the tier's keep count is
//! removed.
//!
//! The engine talks to the outside world only through the traits in
//! [`collaborator`]. [`local::LocalArtifactStore`] and [`mysql::MysqlSource`]
//! are the production implementations.

pub mod artifact;
pub mod collaborator;
pub mod decision;
pub mod driver;
pub mod enforcer;
pub mod error;
pub mod inventory;
pub mod local;
pub mod metrics;
pub mod mysql;
pub mod tier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use artifact::{Artifact, Entity};
pub use collaborator::{ArtifactStore, Clock, DumpProducer, EntityLister, SystemClock};
pub use driver::{Collaborators, DriverSettings, RotationDriver, RunSummary};
pub use error::{CollaboratorError, Result, RotationError};
pub use local::LocalArtifactStore;
pub use metrics::{MetricsSummary, RotationMetrics};
pub use mysql::MysqlSource;
pub use tier::{RetentionTier, TierCatalog, TierName};
