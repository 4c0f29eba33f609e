//! Error taxonomy for convergence.
//!
//! Every failure the driver sees is returned to the caller with enough
//! classification to decide between requeueing and surfacing to an operator.

use thiserror::Error;

use crate::identity::ResourceKind;

/// Desired state cannot be reconciled against the observed remote object.
///
/// Terminal: the driver never retries these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Remote object has a different shape than its resource spec manages.
    #[error("{found} is not a {expected}")]
    UnexpectedExisting {
        expected: ResourceKind,
        found: ResourceKind,
    },

    /// An externally-managed prerequisite is missing and cannot be created.
    #[error("custom vnet was provided but subnet {0} is missing")]
    UnmanagedPrerequisiteMissing(String),

    /// Record address is neither IPv4 nor IPv6.
    #[error("unknown record type for address {0:?}")]
    UnknownRecordType(String),

    /// Spec is missing a field it needs to build a payload.
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Errors reported by a remote client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Object (or operation handle) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Synchronous 4xx-class rejection.
    #[error("rejected ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    /// Transport failure or 5xx-class response.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Failure surfaced from a convergence pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvergeError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Remote rejected the call. `retryable` is set when the configured
    /// retry policy recognises the cause (e.g. throttling).
    #[error("remote rejected {operation}: {source}")]
    RemoteRejected {
        operation: &'static str,
        source: RemoteError,
        retryable: bool,
    },

    #[error("remote unavailable during {operation}: {message}")]
    RemoteUnavailable {
        operation: &'static str,
        message: String,
    },

    /// A previously accepted operation finished with failure.
    #[error("{kind} operation for {name} failed: {message}")]
    OperationFailed {
        kind: String,
        name: String,
        message: String,
    },
}

impl ConvergeError {
    /// Whether the caller may requeue and try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConvergeError::Validation(_) => false,
            ConvergeError::RemoteRejected { retryable, .. } => *retryable,
            ConvergeError::RemoteUnavailable { .. } => true,
            // The state is cleared; a new attempt is up to the caller.
            ConvergeError::OperationFailed { .. } => false,
        }
    }

    /// Short machine-readable reason, used for status conditions.
    pub fn reason(&self) -> &'static str {
        match self {
            ConvergeError::Validation(_) => "ValidationFailed",
            ConvergeError::RemoteRejected { .. } => "RemoteRejected",
            ConvergeError::RemoteUnavailable { .. } => "RemoteUnavailable",
            ConvergeError::OperationFailed { .. } => "OperationFailed",
        }
    }

    /// Classify a remote error raised by `operation`.
    pub(crate) fn from_remote(
        operation: &'static str,
        err: RemoteError,
        retryable_codes: &[String],
    ) -> Self {
        match err {
            RemoteError::Unavailable(message) => ConvergeError::RemoteUnavailable { operation, message },
            RemoteError::Rejected { status, ref code, .. } => {
                let retryable = status == 429 || retryable_codes.iter().any(|c| c == code);
                ConvergeError::RemoteRejected {
                    operation,
                    source: err,
                    retryable,
                }
            }
            RemoteError::NotFound(_) => ConvergeError::RemoteRejected {
                operation,
                source: err,
                retryable: false,
            },
        }
    }
}
