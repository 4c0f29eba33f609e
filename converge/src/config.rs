//! Driver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default age after which a pending operation is abandoned.
pub const DEFAULT_STALENESS_BOUND: Duration = Duration::from_secs(30 * 60);
/// Default interval before re-invoking the driver for an incomplete resource.
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(15);
/// Default bound on a single remote call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(12);

/// Tunables for the convergence driver.
///
/// None of these are protocol guarantees of the remote API; they are
/// operator defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverConfig {
    #[serde(with = "secs")]
    pub staleness_bound: Duration,
    #[serde(with = "secs")]
    pub requeue_after: Duration,
    /// Per-call bound; `None` disables it.
    #[serde(with = "opt_secs")]
    pub call_timeout: Option<Duration>,
    /// Rejection codes the caller treats as transient.
    pub retryable_codes: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            staleness_bound: DEFAULT_STALENESS_BOUND,
            requeue_after: DEFAULT_REQUEUE_AFTER,
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            retryable_codes: ["Throttled", "TooManyRequests", "RetryableError", "AnotherOperationInProgress"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
