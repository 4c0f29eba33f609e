//! converge: resumable convergence of cloud resources.
//!
//! Reconciles desired-state specs against a remote resource-management API
//! whose mutations may complete asynchronously. Pending operations are kept
//! in an [`OperationStore`] owned by the caller and persisted with the
//! owning object's status, so a pass interrupted by a restart resumes
//! polling instead of issuing a duplicate mutation.
//!
//! # Architecture
//!
//! ```text
//! PassRunner (ordered specs, owners first)
//!     |
//!     +--> ConvergenceDriver (one spec, one pass)
//!              |-- OperationStore   (resume / record pending operations)
//!              |-- ResourceSpec     (diff existing vs desired)
//!              +-- RemoteClient     (get / create / update / delete / poll)
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod model;
pub mod operation;
pub mod remote;
pub mod runner;
pub mod spec;
pub mod status;
pub mod status_file;
pub mod store;

// Re-export commonly used types
pub use config::DriverConfig;
pub use driver::{ConvergenceDriver, Outcome, OwnerCheck};
pub use error::{ConvergeError, RemoteError, ValidationError};
pub use identity::{ResourceIdentity, ResourceKind};
pub use model::RemoteObject;
pub use operation::{OperationKey, OperationKind, OperationState};
pub use remote::{PollStatus, RemoteClient, RemoteResponse};
pub use runner::{PassReport, PassRunner, RunnerError, SpecReport};
pub use spec::{ResourceSpec, SpecDocument};
pub use status::{Condition, ConditionStatus, ObjectStatus, Severity, READY_CONDITION};
pub use status_file::{StatusFile, StatusFileError};
pub use store::{OperationHolder, OperationStore};
