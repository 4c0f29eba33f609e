//! Long-running operation state ("future").
//!
//! An `OperationState` records one remote mutation that was accepted but had
//! not completed when the driver last looked. It is persisted in the owning
//! object's status so a later pass, possibly in a different process, can
//! resume polling it instead of issuing a duplicate call.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ResourceIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Patch,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Patch => "patch",
        };
        f.write_str(s)
    }
}

/// Key of an operation: at most one operation per key is ever in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub resource_group: String,
    pub service_name: String,
    pub name: String,
}

impl OperationKey {
    pub fn for_resource(id: &ResourceIdentity) -> Self {
        Self {
            resource_group: id.resource_group.clone(),
            service_name: id.kind.service_name().to_string(),
            name: id.name.clone(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource_group, self.service_name, self.name)
    }
}

/// A pending remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    pub kind: OperationKind,
    pub resource_group: String,
    pub name: String,
    pub service_name: String,
    /// Opaque token handed out by the remote client for resuming polls.
    pub poll_handle: String,
    pub created_at: DateTime<Utc>,
}

impl OperationState {
    pub fn new(kind: OperationKind, id: &ResourceIdentity, poll_handle: String, created_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            resource_group: id.resource_group.clone(),
            name: id.name.clone(),
            service_name: id.kind.service_name().to_string(),
            poll_handle,
            created_at,
        }
    }

    pub fn key(&self) -> OperationKey {
        OperationKey {
            resource_group: self.resource_group.clone(),
            service_name: self.service_name.clone(),
            name: self.name.clone(),
        }
    }

    /// Age at `now`. Zero when `created_at` lies in the future (clock skew
    /// between the process that stored it and this one).
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the operation is older than `bound` and should be abandoned.
    pub fn is_stale(&self, now: DateTime<Utc>, bound: Duration) -> bool {
        self.age(now) > bound
    }
}
