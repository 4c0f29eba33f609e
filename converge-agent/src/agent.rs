//! Reconciliation loop: runs passes over a manifest until it converges,
//! fails terminally, or runs out of passes.

use std::path::Path;

use anyhow::{Context, Result};
use converge::{PassReport, PassRunner, RemoteClient, ResourceSpec, SpecDocument, StatusFile};
use tracing::{debug, error, info, warn};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Converged,
    /// Number of resources that failed terminally.
    Failed(usize),
    PassLimit,
}

/// Read a JSON manifest: a list of specs tagged by `kind`.
pub async fn load_manifest(path: &Path) -> Result<Vec<Box<dyn ResourceSpec>>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let docs: Vec<SpecDocument> =
        serde_json::from_str(&data).with_context(|| format!("Failed to parse manifest {}", path.display()))?;
    Ok(docs.into_iter().map(SpecDocument::into_spec).collect())
}

pub struct Agent<C> {
    runner: PassRunner<C>,
    specs: Vec<Box<dyn ResourceSpec>>,
    status_file: StatusFile,
    max_passes: Option<u32>,
    delete: bool,
}

impl<C: RemoteClient> Agent<C> {
    pub fn new(runner: PassRunner<C>, specs: Vec<Box<dyn ResourceSpec>>, status_file: StatusFile) -> Self {
        Self {
            runner,
            specs,
            status_file,
            max_passes: None,
            delete: false,
        }
    }

    pub fn max_passes(mut self, max: Option<u32>) -> Self {
        self.max_passes = max;
        self
    }

    /// Tear the manifest down instead of converging it.
    pub fn deleting(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }

    pub async fn run(&self) -> Result<Finish> {
        info!(
            "Reconciling {} resources (status: {})",
            self.specs.len(),
            self.status_file.path().display()
        );

        let mut passes = 0u32;
        loop {
            passes += 1;
            let report = self.pass().await?;

            let failed = report.terminal_failures().count();
            let Some(backoff) = report.requeue_after() else {
                if failed > 0 {
                    error!("{} resources failed permanently", failed);
                    return Ok(Finish::Failed(failed));
                }
                info!("All resources converged after {} passes", passes);
                return Ok(Finish::Converged);
            };

            if self.max_passes.is_some_and(|max| passes >= max) {
                warn!("Stopping after {} passes without converging", passes);
                return Ok(Finish::PassLimit);
            }

            info!("Requeueing in {:?}", backoff);
            tokio::time::sleep(backoff).await;
        }
    }

    /// One pass: status is loaded before and saved after, so the process
    /// can stop between any two passes.
    async fn pass(&self) -> Result<PassReport> {
        let mut status = self.status_file.load().await.context("Failed to load status")?;

        let report = if self.delete {
            self.runner.delete_pass(&self.specs, &mut status).await
        } else {
            self.runner.run(&self.specs, &mut status).await
        }
        .context("Invalid manifest")?;

        if self.delete {
            report.apply_delete_to(&mut status);
        } else {
            report.apply_to(&mut status);
        }
        for op in status.long_running_operation_states.iter() {
            debug!(handle = %op.poll_handle, "Pending {} of {}", op.kind, op.key());
        }
        self.status_file.save(&status).await.context("Failed to save status")?;
        Ok(report)
    }
}
