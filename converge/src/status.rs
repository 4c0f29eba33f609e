//! Durable status of the object that owns a set of resources.
//!
//! Holds the operation store plus operator-facing conditions. Terminal
//! failures are written to conditions so they can be diagnosed without logs;
//! transient failures leave conditions alone so they do not flap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{OperationHolder, OperationStore};

/// Condition type reporting whether every resource has converged.
pub const READY_CONDITION: &str = "Ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStatus {
    #[serde(default)]
    pub long_running_operation_states: OperationStore,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ObjectStatus {
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.condition_type == condition_type)
    }

    /// Set a condition. The transition time only moves when the status flips.
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: ConditionStatus,
        severity: Option<Severity>,
        reason: &str,
        message: &str,
    ) {
        let now = Utc::now();
        match self.conditions.iter_mut().find(|c| c.condition_type == condition_type) {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = now;
                }
                existing.status = status;
                existing.severity = severity;
                existing.reason = reason.to_string();
                existing.message = message.to_string();
            }
            None => self.conditions.push(Condition {
                condition_type: condition_type.to_string(),
                status,
                severity,
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: now,
            }),
        }
    }

    pub fn mark_true(&mut self, condition_type: &str) {
        self.set_condition(condition_type, ConditionStatus::True, None, "", "");
    }

    pub fn mark_false(&mut self, condition_type: &str, reason: &str, severity: Severity, message: &str) {
        self.set_condition(condition_type, ConditionStatus::False, Some(severity), reason, message);
    }

    pub fn is_true(&self, condition_type: &str) -> bool {
        self.condition(condition_type)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }
}

impl OperationHolder for ObjectStatus {
    fn operations(&self) -> &OperationStore {
        &self.long_running_operation_states
    }

    fn operations_mut(&mut self) -> &mut OperationStore {
        &mut self.long_running_operation_states
    }
}
