//! Remote client interface.
//!
//! The driver depends only on this shape; transports live behind it.

#[cfg(any(test, feature = "sim"))]
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::identity::ResourceIdentity;
use crate::model::RemoteObject;

/// Result of a mutating call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResponse {
    /// Completed synchronously.
    Done,
    /// Accepted; completion is observed by polling `poll_handle`.
    Accepted { poll_handle: String },
}

/// Result of polling an accepted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Running,
    Succeeded,
    Failed(String),
}

/// Client for the remote resource-management API.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch the current object. `RemoteError::NotFound` when absent.
    async fn get(&self, id: &ResourceIdentity) -> Result<RemoteObject, RemoteError>;

    async fn create(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError>;

    async fn update(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError>;

    async fn delete(&self, id: &ResourceIdentity) -> Result<RemoteResponse, RemoteError>;

    /// Poll an operation previously returned as `Accepted`.
    async fn poll_operation(&self, poll_handle: &str) -> Result<PollStatus, RemoteError>;
}

#[async_trait]
impl<T: RemoteClient + ?Sized> RemoteClient for Arc<T> {
    async fn get(&self, id: &ResourceIdentity) -> Result<RemoteObject, RemoteError> {
        (**self).get(id).await
    }

    async fn create(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError> {
        (**self).create(id, payload).await
    }

    async fn update(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError> {
        (**self).update(id, payload).await
    }

    async fn delete(&self, id: &ResourceIdentity) -> Result<RemoteResponse, RemoteError> {
        (**self).delete(id).await
    }

    async fn poll_operation(&self, poll_handle: &str) -> Result<PollStatus, RemoteError> {
        (**self).poll_operation(poll_handle).await
    }
}
