//! Execution results.
//!
//! Every recovery invocation produces a structured result, success or not.
//! Expected failure modes are data, not errors: the caller always receives
//! the full decision trail for audit and notification.

use crate::action::RecoveryAction;
use crate::circuit::BreakerSnapshot;
use crate::platform::AdapterErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Why a recovery invocation terminally failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// No playbook is registered for the error type.
    PlaybookNotFound { error_type: String },

    /// The circuit breaker blocked the call before any action ran.
    CircuitOpen { retry_in_seconds: u64 },

    /// The action's feature flag is off. An operator decision, not a
    /// system outcome: no breaker failure is recorded.
    ActionDisabled { action: RecoveryAction },

    /// The engine-wide remediation gate is off.
    RemediationDisabled,

    /// Primary (and fallback, if configured) both failed.
    ActionFailed {
        #[serde(rename = "error_kind")]
        kind: AdapterErrorKind,
    },

    /// The action succeeded but the resource reported an unhealthy
    /// terminal state.
    HealthCheckFailed { reason: String },

    /// The action succeeded but the resource never reached a healthy
    /// state within the verification budget.
    HealthCheckTimeout { timeout_seconds: u64 },

    /// A chained playbook was refused (depth bound or cycle).
    ChainAborted { reason: String },
}

/// Best-effort rollback annotation. Never the primary cause of failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// Whether the snapshot restore was accepted by the platform.
    pub succeeded: bool,

    /// Detail for the audit trail.
    pub message: String,
}

/// Result of executing a playbook for one recovery request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookExecutionResult {
    /// Overall outcome: primary success, and chained success where a chain
    /// is configured.
    pub success: bool,

    /// Human-readable summary of what happened.
    pub message: String,

    /// Ordered identifiers of every action actually executed, including
    /// retries, the fallback, and chained actions.
    pub actions_taken: Vec<String>,

    /// Primary-action attempts consumed (fallback not counted).
    pub attempts: u32,

    /// Whether post-action health verification passed. `false` when
    /// verification was disabled or never reached.
    pub health_check_passed: bool,

    /// Whether the fallback action ran.
    pub fallback_invoked: bool,

    /// Failure classification for unsuccessful results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,

    /// Rollback annotation, present only when a rollback was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackOutcome>,

    /// Result of the chained playbook, if one was configured and reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chained_result: Option<Box<PlaybookExecutionResult>>,

    /// Breaker state after this invocation recorded its outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_status: Option<BreakerSnapshot>,

    /// Wall-clock duration of the invocation.
    pub execution_time_seconds: f64,

    /// Action-specific outputs (`new_run_id`, `new_workers`, ...).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl PlaybookExecutionResult {
    /// Empty result scaffold; the executor fills it in as it goes.
    pub fn new() -> Self {
        Self {
            success: false,
            message: String::new(),
            actions_taken: Vec::new(),
            attempts: 0,
            health_check_passed: false,
            fallback_invoked: false,
            failure: None,
            rollback: None,
            chained_result: None,
            circuit_breaker_status: None,
            execution_time_seconds: 0.0,
            metadata: HashMap::new(),
        }
    }

    /// Terminal failure with no actions executed.
    pub fn failed(failure: ExecutionFailure, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failure: Some(failure),
            ..Self::new()
        }
    }
}

impl Default for PlaybookExecutionResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_constructor() {
        let result = PlaybookExecutionResult::failed(
            ExecutionFailure::PlaybookNotFound {
                error_type: "Unknown".to_string(),
            },
            "no playbook",
        );
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert!(result.actions_taken.is_empty());
        assert!(matches!(
            result.failure,
            Some(ExecutionFailure::PlaybookNotFound { .. })
        ));
    }

    #[test]
    fn test_failure_serializes_tagged() {
        let failure = ExecutionFailure::CircuitOpen {
            retry_in_seconds: 120,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "circuit_open");
        assert_eq!(json["retry_in_seconds"], 120);
    }

    #[test]
    fn test_chained_result_nests() {
        let mut parent = PlaybookExecutionResult::new();
        let mut child = PlaybookExecutionResult::new();
        child.success = true;
        child.actions_taken.push("retry_job".to_string());
        parent.chained_result = Some(Box::new(child));

        let json = serde_json::to_value(&parent).unwrap();
        assert_eq!(json["chained_result"]["actions_taken"][0], "retry_job");
    }
}
