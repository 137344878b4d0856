//! Playbook configuration.
//!
//! A playbook binds an error type to a recovery strategy: the primary
//! action, its retry budget, an optional fallback, an optional chained
//! playbook, and the verification and breaker policy around it.

use crate::action::RecoveryAction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Configuration for a recovery playbook. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookConfig {
    /// Primary recovery action.
    pub action: RecoveryAction,

    /// Retries of the primary action after the first attempt. `None`
    /// defers to the engine-wide default.
    pub max_retries: Option<u32>,

    /// Budget for a single primary-action attempt, in seconds.
    pub timeout_seconds: u64,

    /// Action to try once after all primary retries are exhausted.
    pub fallback_action: Option<RecoveryAction>,

    /// Error type whose playbook runs after the primary succeeds
    /// (e.g. scale the cluster, then retry the job).
    pub chained_playbook: Option<String>,

    /// Whether to verify resource health after the action succeeds.
    pub verify_health: bool,

    /// Health-verification budget in seconds. `None` defers to the
    /// engine-wide default.
    pub health_check_timeout: Option<u64>,

    /// Whether to capture resource state before mutating, for rollback.
    pub snapshot_before: bool,

    /// Consecutive failures before the breaker opens. `None` defers to the
    /// engine-wide default.
    pub circuit_breaker_threshold: Option<u32>,

    /// Seconds an open breaker holds before admitting a probe. `None`
    /// defers to the engine-wide default.
    pub circuit_breaker_timeout: Option<u64>,

    /// Action-specific parameters (scale percentage, candidate library
    /// versions, ...).
    #[serde(default)]
    pub action_params: HashMap<String, Value>,

    /// Human-readable summary of the strategy.
    pub description: String,
}

impl Default for PlaybookConfig {
    fn default() -> Self {
        Self {
            action: RecoveryAction::Noop,
            max_retries: None,
            timeout_seconds: 300,
            fallback_action: None,
            chained_playbook: None,
            verify_health: true,
            health_check_timeout: None,
            snapshot_before: false,
            circuit_breaker_threshold: None,
            circuit_breaker_timeout: None,
            action_params: HashMap::new(),
            description: String::new(),
        }
    }
}

impl PlaybookConfig {
    /// Operator-facing view of this playbook.
    pub fn public_view(&self, error_type: &str) -> PlaybookView {
        PlaybookView {
            error_type: error_type.to_string(),
            action: self.action,
            max_retries: self.max_retries,
            fallback_action: self.fallback_action,
            chained_playbook: self.chained_playbook.clone(),
            verify_health: self.verify_health,
            description: self.description.clone(),
        }
    }
}

/// Read-only summary of a registered playbook, as listed by the operator
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookView {
    pub error_type: String,
    pub action: RecoveryAction,
    pub max_retries: Option<u32>,
    pub fallback_action: Option<RecoveryAction>,
    pub chained_playbook: Option<String>,
    pub verify_health: bool,
    pub description: String,
}
