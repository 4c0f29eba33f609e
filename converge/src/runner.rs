//! Reconciliation passes over an ordered set of specs.
//!
//! The runner is the caller side of the driver contract: it invokes the
//! driver once per spec, confirms owners from what converged earlier in the
//! same pass, and folds the outcomes into a requeue decision and status
//! conditions.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::driver::{ConvergenceDriver, Outcome};
use crate::identity::{ResourceIdentity, ResourceKind};
use crate::remote::RemoteClient;
use crate::spec::ResourceSpec;
use crate::status::{ObjectStatus, Severity, READY_CONDITION};
use crate::store::OperationHolder;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("{dependent} is listed before its owner {owner}")]
    OrderViolation { dependent: String, owner: String },

    #[error("duplicate resource {0}")]
    Duplicate(String),

    #[error("resource name is empty for {0} in resource group {1:?}")]
    EmptyName(ResourceKind, String),
}

/// Outcome for one spec in a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecReport {
    pub identity: ResourceIdentity,
    pub outcome: Outcome,
}

/// Aggregate of one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub results: Vec<SpecReport>,
    backoff: Duration,
}

impl PassReport {
    /// Every spec is up to date or converged.
    pub fn is_converged(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ready())
    }

    /// Specs that failed and will not succeed by retrying.
    pub fn terminal_failures(&self) -> impl Iterator<Item = &SpecReport> {
        self.results
            .iter()
            .filter(|r| r.outcome.error().is_some_and(|e| !e.is_retryable()))
    }

    /// When to run the next pass, if one is needed.
    ///
    /// Incomplete and retryable-failed specs call for another pass after the
    /// configured backoff. Blocked specs do too, unless the pass also holds a
    /// terminal failure: those stay blocked until an operator intervenes.
    pub fn requeue_after(&self) -> Option<Duration> {
        let terminal = self.terminal_failures().next().is_some();
        let pending = self.results.iter().any(|r| match &r.outcome {
            Outcome::Incomplete => true,
            Outcome::BlockedOnOwner => !terminal,
            Outcome::Failed(err) => err.is_retryable(),
            Outcome::UpToDate | Outcome::Converged => false,
        });
        pending.then_some(self.backoff)
    }

    /// Reflect a create/update pass in the `Ready` condition.
    ///
    /// Retryable failures alone leave the condition untouched.
    pub fn apply_to(&self, status: &mut ObjectStatus) {
        if self.mark_failures(status) {
            return;
        }
        if self.is_converged() {
            status.mark_true(READY_CONDITION);
            return;
        }
        self.mark_waiting(status, "Reconciling");
    }

    /// Reflect a delete pass in the `Ready` condition.
    pub fn apply_delete_to(&self, status: &mut ObjectStatus) {
        if self.mark_failures(status) {
            return;
        }
        if self.is_converged() {
            status.mark_false(READY_CONDITION, "Deleted", Severity::Info, "");
            return;
        }
        self.mark_waiting(status, "Deleting");
    }

    fn mark_failures(&self, status: &mut ObjectStatus) -> bool {
        let failures: Vec<&SpecReport> = self.terminal_failures().collect();
        let Some(first) = failures.first() else {
            return false;
        };
        let message = failures
            .iter()
            .filter_map(|r| r.outcome.error().map(|e| format!("{}: {}", r.identity, e)))
            .collect::<Vec<_>>()
            .join("; ");
        let reason = first.outcome.error().map(|e| e.reason()).unwrap_or("Failed");
        status.mark_false(READY_CONDITION, reason, Severity::Error, &message);
        true
    }

    fn mark_waiting(&self, status: &mut ObjectStatus, reason: &str) {
        let waiting: Vec<String> = self
            .results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Incomplete | Outcome::BlockedOnOwner))
            .map(|r| r.identity.to_string())
            .collect();
        if !waiting.is_empty() {
            let message = format!("waiting for {}", waiting.join(", "));
            status.mark_false(READY_CONDITION, reason, Severity::Info, &message);
        }
    }
}

/// Runs passes of a [`ConvergenceDriver`] over topologically ordered specs.
pub struct PassRunner<C> {
    driver: ConvergenceDriver<C>,
    external_owners: HashSet<String>,
}

impl<C: RemoteClient> PassRunner<C> {
    pub fn new(driver: ConvergenceDriver<C>) -> Self {
        Self {
            driver,
            external_owners: HashSet::new(),
        }
    }

    /// Owners that are not managed here but known to exist.
    pub fn with_external_owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_owners.extend(owners.into_iter().map(Into::into));
        self
    }

    pub fn driver(&self) -> &ConvergenceDriver<C> {
        &self.driver
    }

    /// Check that every managed owner precedes its dependents and that no
    /// resource appears twice.
    pub fn validate_order(specs: &[Box<dyn ResourceSpec>]) -> Result<(), RunnerError> {
        let names: HashSet<&str> = specs.iter().map(|s| s.resource_name()).collect();
        let mut seen_names = HashSet::new();
        let mut seen_ids = HashSet::new();

        for spec in specs {
            let id = spec.identity();
            if id.name.is_empty() {
                return Err(RunnerError::EmptyName(id.kind, id.resource_group));
            }
            if !seen_ids.insert((id.kind, id.resource_group.clone(), id.name.clone())) {
                return Err(RunnerError::Duplicate(id.to_string()));
            }
            if id.has_owner() && names.contains(id.owner.as_str()) && !seen_names.contains(id.owner.as_str()) {
                return Err(RunnerError::OrderViolation {
                    dependent: id.to_string(),
                    owner: id.owner,
                });
            }
            seen_names.insert(spec.resource_name());
        }
        Ok(())
    }

    /// Converge every spec once, owners first.
    pub async fn run<H: OperationHolder>(
        &self,
        specs: &[Box<dyn ResourceSpec>],
        status: &mut H,
    ) -> Result<PassReport, RunnerError> {
        Self::validate_order(specs)?;

        let mut ready: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(specs.len());
        debug!(
            "Starting pass over {} specs with {} pending operations",
            specs.len(),
            status.operations().len()
        );

        for spec in specs {
            let owner_exists = |id: &ResourceIdentity| ready.contains(&id.owner) || self.external_owners.contains(&id.owner);
            let outcome = self
                .driver
                .reconcile(spec.as_ref(), status.operations_mut(), &owner_exists)
                .await;

            let identity = spec.identity();
            match &outcome {
                Outcome::Failed(err) => warn!("Reconciliation failed for {}: {}", identity, err),
                other => debug!("{}: {:?}", identity, other),
            }
            if outcome.is_ready() {
                ready.insert(identity.name.clone());
            }
            results.push(SpecReport { identity, outcome });
        }

        let report = PassReport {
            results,
            backoff: self.driver.config().requeue_after,
        };
        info!(
            "Pass finished: {} specs, converged={}, requeue={:?}",
            report.results.len(),
            report.is_converged(),
            report.requeue_after()
        );
        Ok(report)
    }

    /// Delete every spec once, dependents first. An owner is only deleted
    /// once all of its dependents in the list are gone; an owner whose
    /// dependent failed terminally is reported blocked.
    pub async fn delete_pass<H: OperationHolder>(
        &self,
        specs: &[Box<dyn ResourceSpec>],
        status: &mut H,
    ) -> Result<PassReport, RunnerError> {
        Self::validate_order(specs)?;

        let mut waiting_owners: HashSet<String> = HashSet::new();
        let mut stuck_owners: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(specs.len());

        for spec in specs.iter().rev() {
            let identity = spec.identity();
            let outcome = if stuck_owners.contains(&identity.name) {
                warn!("{} has a dependent that cannot be deleted", identity);
                Outcome::BlockedOnOwner
            } else if waiting_owners.contains(&identity.name) {
                debug!("{} still has dependents, deferring delete", identity);
                Outcome::Incomplete
            } else {
                self.driver.delete(spec.as_ref(), status.operations_mut()).await
            };

            if let Outcome::Failed(err) = &outcome {
                warn!("Delete failed for {}: {}", identity, err);
            }
            if identity.has_owner() {
                let stuck = matches!(&outcome, Outcome::BlockedOnOwner)
                    || outcome.error().is_some_and(|e| !e.is_retryable());
                if stuck {
                    stuck_owners.insert(identity.owner.clone());
                } else if !outcome.is_ready() {
                    waiting_owners.insert(identity.owner.clone());
                }
            }
            results.push(SpecReport { identity, outcome });
        }

        Ok(PassReport {
            results,
            backoff: self.driver.config().requeue_after,
        })
    }
}
