//! Error taxonomy for a rotation run.
//!
//! Configuration errors stop the run before any rotation work starts. Strict
//! collaborator failures (dump, duplicate, delete, directory bootstrap) abort
//! the run where they happen. Tolerant failures (artifact listing) never reach
//! this module: the inventory accessor absorbs them.

use std::path::PathBuf;

use common::ConfigError;
use thiserror::Error;

/// Exit code for configuration failures and failures without a usable status.
pub const FAILURE_EXIT_CODE: u8 = 1;

/// A collaborator operation that did not succeed.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// An external program finished with a non-zero status, or was killed.
    #[error(
        "Failed running command: {command} ({operation}, status {})",
        .status.map_or_else(|| "none".to_string(), |s| s.to_string())
    )]
    Exited {
        operation: &'static str,
        command: String,
        status: Option<i32>,
    },

    /// A filesystem or process-spawning call failed.
    #[error("{operation} failed for {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The collaborator cannot perform the operation at all.
    #[error("{operation} unavailable: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CollaboratorError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Name of the operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            CollaboratorError::Exited { operation, .. }
            | CollaboratorError::Io { operation, .. }
            | CollaboratorError::Unavailable { operation, .. } => operation,
        }
    }

    /// Process exit code to propagate for this failure.
    ///
    /// A program's own status is passed through when it fits in `1..=255`.
    pub fn status_code(&self) -> u8 {
        match self {
            CollaboratorError::Exited {
                status: Some(status),
                ..
            } => u8::try_from(*status)
                .ok()
                .filter(|code| *code != 0)
                .unwrap_or(FAILURE_EXIT_CODE),
            _ => FAILURE_EXIT_CODE,
        }
    }
}

/// Terminal error of a rotation run.
#[derive(Error, Debug)]
pub enum RotationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl RotationError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            RotationError::Config(_) => FAILURE_EXIT_CODE,
            RotationError::Collaborator(e) => e.status_code(),
        }
    }
}

pub type Result<T, E = RotationError> = std::result::Result<T, E>;
