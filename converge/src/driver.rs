//! Convergence driver.
//!
//! One algorithm converges every resource kind. Each call is a single pass:
//! resume any pending operation, fetch the remote object, diff it against
//! its desired state, and issue at most one mutation. The driver never waits
//! for an operation to finish; it returns [`Outcome::Incomplete`] and relies
//! on the caller to invoke it again.
//!
//! The store is only written after an awaited remote call has returned, so
//! dropping a pass mid-call never persists a partial operation state.

use std::future::Future;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::{ConvergeError, RemoteError};
use crate::identity::ResourceIdentity;
use crate::model::RemoteObject;
use crate::operation::{OperationKey, OperationKind, OperationState};
use crate::remote::{PollStatus, RemoteClient, RemoteResponse};
use crate::spec::ResourceSpec;
use crate::store::OperationStore;

/// Result of one pass over one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Remote already matched; nothing was issued.
    UpToDate,
    /// A mutation completed during this pass or a resumed one was confirmed.
    Converged,
    /// An operation is in flight; invoke again after a backoff.
    Incomplete,
    /// The owner's existence could not be confirmed; nothing was issued.
    BlockedOnOwner,
    /// The pass failed; the error says whether a retry can help.
    Failed(ConvergeError),
}

impl Outcome {
    /// Converged or already up to date.
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::UpToDate | Outcome::Converged)
    }

    pub fn error(&self) -> Option<&ConvergeError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Caller-supplied check that a resource's owner exists.
pub trait OwnerCheck: Send + Sync {
    fn owner_exists(&self, id: &ResourceIdentity) -> bool;
}

impl<F> OwnerCheck for F
where
    F: Fn(&ResourceIdentity) -> bool + Send + Sync,
{
    fn owner_exists(&self, id: &ResourceIdentity) -> bool {
        self(id)
    }
}

/// What resuming a stored operation produced.
enum Resume {
    /// Nothing pending.
    Idle,
    /// Pending operation finished successfully and was cleared.
    Completed,
    /// Pending operation finished with failure and was cleared.
    Failed { kind: OperationKind, error: ConvergeError },
    /// Stop the pass with this outcome.
    Return(Outcome),
}

/// Drives resources towards their specs through a [`RemoteClient`].
pub struct ConvergenceDriver<C> {
    client: C,
    config: DriverConfig,
}

impl<C: RemoteClient> ConvergenceDriver<C> {
    pub fn new(client: C, config: DriverConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run one create/update pass for `spec`.
    pub async fn reconcile(
        &self,
        spec: &dyn ResourceSpec,
        store: &mut OperationStore,
        owners: &dyn OwnerCheck,
    ) -> Outcome {
        let id = spec.identity();
        let key = OperationKey::for_resource(&id);

        let resumed = match self.resume(&id, &key, store).await {
            Resume::Idle => false,
            Resume::Completed => true,
            Resume::Failed { error, .. } => return Outcome::Failed(error),
            Resume::Return(outcome) => return outcome,
        };

        if id.has_owner() && !owners.owner_exists(&id) {
            info!("{} is waiting for owner {}", id, id.owner);
            return Outcome::BlockedOnOwner;
        }

        let existing = match self.fetch(&id).await {
            Ok(existing) => existing,
            Err(err) => return Outcome::Failed(err),
        };

        let payload = match spec.parameters(existing.as_ref()) {
            Ok(Some(payload)) => payload,
            Ok(None) if resumed => {
                info!("{} converged", id);
                return Outcome::Converged;
            }
            Ok(None) => {
                debug!("{} is up to date", id);
                return Outcome::UpToDate;
            }
            Err(err) => {
                warn!("{} cannot be reconciled: {}", id, err);
                return Outcome::Failed(err.into());
            }
        };

        let (kind, result) = if existing.is_some() {
            info!("Updating {}", id);
            (OperationKind::Update, self.call(self.client.update(&id, payload)).await)
        } else {
            info!("Creating {}", id);
            (OperationKind::Create, self.call(self.client.create(&id, payload)).await)
        };

        self.record(kind, &id, store, result)
    }

    /// Run one delete pass for `spec`.
    ///
    /// A pending create or update that failed does not block deletion.
    pub async fn delete(&self, spec: &dyn ResourceSpec, store: &mut OperationStore) -> Outcome {
        let id = spec.identity();
        let key = OperationKey::for_resource(&id);

        let resumed = match self.resume(&id, &key, store).await {
            Resume::Idle => false,
            Resume::Completed => true,
            Resume::Failed {
                kind: OperationKind::Delete,
                error,
            } => return Outcome::Failed(error),
            Resume::Failed { kind, error } => {
                warn!("Ignoring failed {} of {} before delete: {}", kind, id, error);
                false
            }
            Resume::Return(outcome) => return outcome,
        };

        match self.fetch(&id).await {
            Ok(Some(_)) => {}
            Ok(None) if resumed => {
                info!("{} deleted", id);
                return Outcome::Converged;
            }
            Ok(None) => {
                debug!("{} already absent", id);
                return Outcome::UpToDate;
            }
            Err(err) => return Outcome::Failed(err),
        }

        info!("Deleting {}", id);
        match self.call(self.client.delete(&id)).await {
            Err(RemoteError::NotFound(_)) => {
                info!("{} deleted", id);
                Outcome::Converged
            }
            result => self.record(OperationKind::Delete, &id, store, result),
        }
    }

    /// Resume the stored operation for `key`, if any.
    async fn resume(&self, id: &ResourceIdentity, key: &OperationKey, store: &mut OperationStore) -> Resume {
        let Some(state) = store.get(key).cloned() else {
            return Resume::Idle;
        };

        if state.is_stale(Utc::now(), self.config.staleness_bound) {
            warn!(
                handle = %state.poll_handle,
                "Abandoning stale {} operation for {} (started {})",
                state.kind, id, state.created_at
            );
            store.remove(key);
            return Resume::Return(Outcome::Incomplete);
        }

        match self.call(self.client.poll_operation(&state.poll_handle)).await {
            Ok(PollStatus::Running) => {
                debug!(handle = %state.poll_handle, "{} operation for {} still running", state.kind, id);
                Resume::Return(Outcome::Incomplete)
            }
            Ok(PollStatus::Succeeded) => {
                info!(handle = %state.poll_handle, "{} operation for {} succeeded", state.kind, id);
                store.remove(key);
                Resume::Completed
            }
            Ok(PollStatus::Failed(message)) => {
                warn!(handle = %state.poll_handle, "{} operation for {} failed: {}", state.kind, id, message);
                store.remove(key);
                Resume::Failed {
                    kind: state.kind,
                    error: ConvergeError::OperationFailed {
                        kind: state.kind.to_string(),
                        name: id.name.clone(),
                        message,
                    },
                }
            }
            Err(RemoteError::NotFound(_)) => {
                // The remote no longer knows the handle; recompute from scratch.
                warn!(handle = %state.poll_handle, "{} operation for {} was lost", state.kind, id);
                store.remove(key);
                Resume::Idle
            }
            Err(err) => Resume::Return(Outcome::Failed(self.classify("poll", err))),
        }
    }

    /// Fetch the remote object, mapping not-found to `None`.
    async fn fetch(&self, id: &ResourceIdentity) -> Result<Option<RemoteObject>, ConvergeError> {
        match self.call(self.client.get(id)).await {
            Ok(obj) => Ok(Some(obj)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(err) => Err(self.classify("get", err)),
        }
    }

    /// Turn the result of a mutating call into an outcome, storing a
    /// pending operation if it was accepted.
    fn record(
        &self,
        kind: OperationKind,
        id: &ResourceIdentity,
        store: &mut OperationStore,
        result: Result<RemoteResponse, RemoteError>,
    ) -> Outcome {
        match result {
            Ok(RemoteResponse::Done) => {
                info!("{} of {} completed", kind, id);
                Outcome::Converged
            }
            Ok(RemoteResponse::Accepted { poll_handle }) => {
                info!(handle = %poll_handle, "{} of {} accepted", kind, id);
                store.set(OperationState::new(kind, id, poll_handle, Utc::now()));
                Outcome::Incomplete
            }
            Err(err) => {
                let operation = match kind {
                    OperationKind::Create => "create",
                    OperationKind::Update => "update",
                    OperationKind::Delete => "delete",
                    OperationKind::Patch => "patch",
                };
                Outcome::Failed(self.classify(operation, err))
            }
        }
    }

    fn classify(&self, operation: &'static str, err: RemoteError) -> ConvergeError {
        ConvergeError::from_remote(operation, err, &self.config.retryable_codes)
    }

    /// Await a remote call under the configured per-call timeout.
    async fn call<T>(&self, fut: impl Future<Output = Result<T, RemoteError>>) -> Result<T, RemoteError> {
        match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(RemoteError::Unavailable(format!("call timed out after {:?}", limit)))),
            None => fut.await,
        }
    }
}
