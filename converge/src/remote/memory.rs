//! In-memory simulated remote.
//!
//! Accepted operations complete after a configurable number of polls. Call
//! counters and failure injection make it usable as a test double; the agent
//! also runs against it in simulation mode.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{PollStatus, RemoteClient, RemoteResponse};
use crate::error::RemoteError;
use crate::identity::{ResourceIdentity, ResourceKind};
use crate::model::RemoteObject;

type ObjectKey = (ResourceKind, String, String);

fn object_key(id: &ResourceIdentity) -> ObjectKey {
    (id.kind, id.resource_group.clone(), id.name.clone())
}

/// Remote methods, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Create,
    Update,
    Delete,
    Poll,
}

/// Number of calls made per method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: u32,
    pub create: u32,
    pub update: u32,
    pub delete: u32,
    pub poll: u32,
}

impl CallCounts {
    /// Calls that mutate remote state.
    pub fn mutations(&self) -> u32 {
        self.create + self.update + self.delete
    }

    fn bump(&mut self, method: Method) {
        match method {
            Method::Get => self.get += 1,
            Method::Create => self.create += 1,
            Method::Update => self.update += 1,
            Method::Delete => self.delete += 1,
            Method::Poll => self.poll += 1,
        }
    }
}

#[derive(Debug)]
enum Action {
    Put(RemoteObject),
    Delete,
}

#[derive(Debug)]
struct PendingOperation {
    key: ObjectKey,
    action: Action,
    polls_remaining: u32,
    failure: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<ObjectKey, RemoteObject>,
    operations: HashMap<String, PendingOperation>,
    async_polls: u32,
    operation_failure: Option<String>,
    injected: HashMap<Method, VecDeque<RemoteError>>,
    next_handles: VecDeque<String>,
    calls: CallCounts,
}

impl Inner {
    fn enter(&mut self, method: Method) -> Result<(), RemoteError> {
        self.calls.bump(method);
        match self.injected.get_mut(&method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply(&mut self, key: ObjectKey, action: Action) {
        match action {
            Action::Put(obj) => {
                self.objects.insert(key, obj);
            }
            Action::Delete => {
                self.objects.remove(&key);
            }
        }
    }

    fn submit(&mut self, key: ObjectKey, action: Action) -> RemoteResponse {
        // Failing operations are always accepted so the failure surfaces on poll.
        if self.async_polls == 0 && self.operation_failure.is_none() {
            self.apply(key, action);
            return RemoteResponse::Done;
        }

        let poll_handle = self
            .next_handles
            .pop_front()
            .unwrap_or_else(|| format!("op-{}", Uuid::new_v4()));
        self.operations.insert(
            poll_handle.clone(),
            PendingOperation {
                key,
                action,
                polls_remaining: self.async_polls.saturating_sub(1),
                failure: self.operation_failure.clone(),
            },
        );
        RemoteResponse::Accepted { poll_handle }
    }
}

/// Simulated remote resource-management API.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    /// Remote whose mutations complete synchronously.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote whose mutations are accepted and finish on the `polls`-th
    /// poll. Zero means mutations complete synchronously.
    pub fn with_async_polls(polls: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                async_polls: polls,
                ..Default::default()
            }),
        }
    }

    pub async fn set_async_polls(&self, polls: u32) {
        self.inner.lock().await.async_polls = polls;
    }

    /// Make every subsequently accepted operation finish with `message`.
    pub async fn fail_operations(&self, message: Option<&str>) {
        self.inner.lock().await.operation_failure = message.map(String::from);
    }

    /// Fail the next call to `method` with `err`.
    pub async fn fail_next(&self, method: Method, err: RemoteError) {
        self.inner.lock().await.injected.entry(method).or_default().push_back(err);
    }

    /// Use `handle` for the next accepted operation.
    pub async fn push_poll_handle(&self, handle: &str) {
        self.inner.lock().await.next_handles.push_back(handle.to_string());
    }

    /// Drop all pending operations, as a remote that loses handles would.
    pub async fn forget_operations(&self) {
        self.inner.lock().await.operations.clear();
    }

    pub async fn insert(&self, id: &ResourceIdentity, obj: RemoteObject) {
        self.inner.lock().await.objects.insert(object_key(id), obj);
    }

    pub async fn object(&self, id: &ResourceIdentity) -> Option<RemoteObject> {
        self.inner.lock().await.objects.get(&object_key(id)).cloned()
    }

    pub async fn pending_operations(&self) -> usize {
        self.inner.lock().await.operations.len()
    }

    pub async fn calls(&self) -> CallCounts {
        self.inner.lock().await.calls
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    async fn get(&self, id: &ResourceIdentity) -> Result<RemoteObject, RemoteError> {
        let mut inner = self.inner.lock().await;
        inner.enter(Method::Get)?;
        inner
            .objects
            .get(&object_key(id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn create(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError> {
        let mut inner = self.inner.lock().await;
        inner.enter(Method::Create)?;
        debug!("memory remote: create {}", id);
        Ok(inner.submit(object_key(id), Action::Put(payload)))
    }

    async fn update(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError> {
        let mut inner = self.inner.lock().await;
        inner.enter(Method::Update)?;
        debug!("memory remote: update {}", id);
        Ok(inner.submit(object_key(id), Action::Put(payload)))
    }

    async fn delete(&self, id: &ResourceIdentity) -> Result<RemoteResponse, RemoteError> {
        let mut inner = self.inner.lock().await;
        inner.enter(Method::Delete)?;
        let key = object_key(id);
        if !inner.objects.contains_key(&key) {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        debug!("memory remote: delete {}", id);
        Ok(inner.submit(key, Action::Delete))
    }

    async fn poll_operation(&self, poll_handle: &str) -> Result<PollStatus, RemoteError> {
        let mut inner = self.inner.lock().await;
        inner.enter(Method::Poll)?;

        let Some(op) = inner.operations.get_mut(poll_handle) else {
            return Err(RemoteError::NotFound(format!("operation {}", poll_handle)));
        };
        if op.polls_remaining > 0 {
            op.polls_remaining -= 1;
            return Ok(PollStatus::Running);
        }

        let Some(op) = inner.operations.remove(poll_handle) else {
            return Err(RemoteError::NotFound(format!("operation {}", poll_handle)));
        };
        match op.failure {
            Some(message) => Ok(PollStatus::Failed(message)),
            None => {
                inner.apply(op.key, op.action);
                Ok(PollStatus::Succeeded)
            }
        }
    }
}
