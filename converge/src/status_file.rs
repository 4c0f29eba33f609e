//! File-backed durable status.
//!
//! Persists an [`ObjectStatus`] as JSON so pending operations survive
//! process restarts. Writes go to a temporary sibling and are renamed into
//! place, so a crash never leaves a truncated status behind.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::status::ObjectStatus;

#[derive(Debug, Error)]
pub enum StatusFileError {
    #[error("status file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("status file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the status, or an empty one if the file does not exist yet.
    pub async fn load(&self) -> Result<ObjectStatus, StatusFileError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No status at {}, starting empty", self.path.display());
                return Ok(ObjectStatus::default());
            }
            Err(source) => {
                return Err(StatusFileError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&data).map_err(|source| StatusFileError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    pub async fn save(&self, status: &ObjectStatus) -> Result<(), StatusFileError> {
        let data = serde_json::to_vec_pretty(status).map_err(|source| StatusFileError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("tmp");
        let io_err = |source| StatusFileError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, &data).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        debug!(
            operations = status.long_running_operation_states.len(),
            "Saved status to {}",
            self.path.display()
        );
        Ok(())
    }
}
