//! Recovery actions.
//!
//! The closed set of operations the executor can dispatch against a
//! platform adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Actions that can be taken to recover a failed pipeline resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Trigger a fresh run of a failed job.
    RetryJob,

    /// Restart a terminated or wedged cluster.
    RestartCluster,

    /// Scale a cluster's worker pool up by a percentage, bounded by a cap.
    ScaleCluster,

    /// Install an earlier known-good version of a failing library.
    LibraryFallback,

    /// Re-trigger a data-factory pipeline run.
    RerunPipeline,

    /// Restore a resource's configuration from a pre-action snapshot.
    RollbackConfig,

    /// Do nothing; always succeeds. Used for probes and error types with
    /// no automated recovery.
    Noop,
}

impl RecoveryAction {
    /// Stable identifier used in `actions_taken` audit trails.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::RetryJob => "retry_job",
            RecoveryAction::RestartCluster => "restart_cluster",
            RecoveryAction::ScaleCluster => "scale_cluster",
            RecoveryAction::LibraryFallback => "library_fallback",
            RecoveryAction::RerunPipeline => "rerun_pipeline",
            RecoveryAction::RollbackConfig => "rollback_config",
            RecoveryAction::Noop => "noop",
        }
    }

    /// Whether the action mutates existing resource configuration.
    ///
    /// Job and pipeline retries create new runs and leave the underlying
    /// resource untouched; only mutating actions are rollback candidates.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            RecoveryAction::RestartCluster
                | RecoveryAction::ScaleCluster
                | RecoveryAction::LibraryFallback
                | RecoveryAction::RollbackConfig
        )
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serde_snake_case() {
        let json = serde_json::to_string(&RecoveryAction::RetryJob).unwrap();
        assert_eq!(json, "\"retry_job\"");

        let parsed: RecoveryAction = serde_json::from_str("\"scale_cluster\"").unwrap();
        assert_eq!(parsed, RecoveryAction::ScaleCluster);
    }

    #[test]
    fn test_mutating_actions() {
        assert!(RecoveryAction::RestartCluster.is_mutating());
        assert!(RecoveryAction::ScaleCluster.is_mutating());
        assert!(!RecoveryAction::RetryJob.is_mutating());
        assert!(!RecoveryAction::RerunPipeline.is_mutating());
        assert!(!RecoveryAction::Noop.is_mutating());
    }
}
