//! Operation store.
//!
//! The store is owned by the caller and persisted with the owning object's
//! status. The driver borrows it mutably for the duration of one pass.

use std::collections::btree_map::{BTreeMap, Entry};

use serde::{Deserialize, Serialize};

use crate::operation::{OperationKey, OperationState};

/// Pending operations keyed by `(resource_group, service_name, name)`.
///
/// Persisted as a JSON object mapping `"<group>/<service>/<name>"` to the
/// operation state. Keys are rebuilt from the states on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, OperationState>", try_from = "BTreeMap<String, OperationState>")]
pub struct OperationStore {
    operations: BTreeMap<OperationKey, OperationState>,
}

impl OperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &OperationKey) -> Option<&OperationState> {
        self.operations.get(key)
    }

    /// Insert or replace the operation for the state's key.
    ///
    /// Returns the operation it replaced, if any.
    pub fn set(&mut self, state: OperationState) -> Option<OperationState> {
        self.operations.insert(state.key(), state)
    }

    pub fn remove(&mut self, key: &OperationKey) -> Option<OperationState> {
        self.operations.remove(key)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationState> {
        self.operations.values()
    }
}

impl From<OperationStore> for BTreeMap<String, OperationState> {
    fn from(store: OperationStore) -> Self {
        store
            .operations
            .into_iter()
            .map(|(key, state)| (key.to_string(), state))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, OperationState>> for OperationStore {
    type Error = String;

    fn try_from(map: BTreeMap<String, OperationState>) -> Result<Self, Self::Error> {
        let mut operations = BTreeMap::new();
        for state in map.into_values() {
            match operations.entry(state.key()) {
                Entry::Occupied(e) => return Err(format!("duplicate operation for {}", e.key())),
                Entry::Vacant(e) => {
                    e.insert(state);
                }
            }
        }
        Ok(Self { operations })
    }
}

/// Access to the operation store of a durable status object.
pub trait OperationHolder {
    fn operations(&self) -> &OperationStore;
    fn operations_mut(&mut self) -> &mut OperationStore;
}

impl OperationHolder for OperationStore {
    fn operations(&self) -> &OperationStore {
        self
    }

    fn operations_mut(&mut self) -> &mut OperationStore {
        self
    }
}
