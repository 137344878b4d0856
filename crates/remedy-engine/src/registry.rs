//! Playbook registry.
//!
//! A read-only map from error type to recovery strategy, populated once at
//! startup. The built-in table below is data, not code: the same executor
//! can be driven by platform-owned playbook files without touching the
//! engine.

use remedy_types::{PlaybookConfig, PlaybookView, RecoveryAction};
use std::collections::HashMap;

/// Process-wide, read-only playbook catalog.
pub struct PlaybookRegistry {
    playbooks: HashMap<String, PlaybookConfig>,
}

impl PlaybookRegistry {
    /// Registry populated from the built-in table.
    pub fn builtin() -> Self {
        Self::with_playbooks(builtin_playbooks())
    }

    /// Registry populated from an explicit table.
    pub fn with_playbooks<I, K>(playbooks: I) -> Self
    where
        I: IntoIterator<Item = (K, PlaybookConfig)>,
        K: Into<String>,
    {
        Self {
            playbooks: playbooks
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    /// Look up the playbook for an error type.
    pub fn get(&self, error_type: &str) -> Option<&PlaybookConfig> {
        self.playbooks.get(error_type)
    }

    /// All registered error types, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.playbooks.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Operator-facing views of every playbook, sorted by error type.
    pub fn public_views(&self) -> Vec<PlaybookView> {
        self.list()
            .into_iter()
            .filter_map(|error_type| {
                self.playbooks
                    .get(error_type)
                    .map(|p| p.public_view(error_type))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }
}

/// The built-in recovery strategies for Databricks and Data Factory
/// failures.
fn builtin_playbooks() -> Vec<(&'static str, PlaybookConfig)> {
    vec![
        (
            "DatabricksJobExecutionError",
            PlaybookConfig {
                action: RecoveryAction::RetryJob,
                max_retries: Some(3),
                timeout_seconds: 600,
                fallback_action: Some(RecoveryAction::ScaleCluster),
                description: "Retry failed job with exponential backoff, scale cluster if retries fail".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksClusterStartFailure",
            PlaybookConfig {
                action: RecoveryAction::RestartCluster,
                max_retries: Some(2),
                timeout_seconds: 600,
                snapshot_before: true,
                description: "Restart cluster that failed to start".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksClusterTerminated",
            PlaybookConfig {
                action: RecoveryAction::RestartCluster,
                max_retries: Some(1),
                timeout_seconds: 600,
                description: "Restart unexpectedly terminated cluster".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksResourceExhausted",
            PlaybookConfig {
                action: RecoveryAction::ScaleCluster,
                max_retries: Some(2),
                timeout_seconds: 300,
                snapshot_before: true,
                description: "Scale up cluster workers to handle resource exhaustion".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksOutOfMemoryError",
            PlaybookConfig {
                action: RecoveryAction::ScaleCluster,
                max_retries: Some(1),
                timeout_seconds: 300,
                chained_playbook: Some("DatabricksJobExecutionError".to_string()),
                snapshot_before: true,
                description: "Scale cluster after OOM, then retry the job".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksDriverNotResponding",
            PlaybookConfig {
                action: RecoveryAction::RestartCluster,
                max_retries: Some(2),
                timeout_seconds: 600,
                fallback_action: Some(RecoveryAction::ScaleCluster),
                snapshot_before: true,
                description: "Restart unresponsive driver, scale if the restart fails".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksLibraryInstallationError",
            PlaybookConfig {
                action: RecoveryAction::LibraryFallback,
                max_retries: Some(3),
                timeout_seconds: 300,
                fallback_action: Some(RecoveryAction::RestartCluster),
                snapshot_before: true,
                description: "Try known-good library versions, restart cluster if all fail".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksConfigurationError",
            PlaybookConfig {
                action: RecoveryAction::RollbackConfig,
                max_retries: Some(1),
                timeout_seconds: 180,
                snapshot_before: true,
                description: "Roll back to the previous working configuration".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksTimeoutError",
            PlaybookConfig {
                action: RecoveryAction::RetryJob,
                max_retries: Some(2),
                timeout_seconds: 900,
                fallback_action: Some(RecoveryAction::ScaleCluster),
                description: "Retry with extended timeout, scale if the timeout persists".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksPermissionDenied",
            PlaybookConfig {
                action: RecoveryAction::Noop,
                max_retries: Some(0),
                verify_health: false,
                description: "Permission issues require manual intervention".to_string(),
                ..Default::default()
            },
        ),
        (
            "DatabricksNetworkError",
            PlaybookConfig {
                action: RecoveryAction::RetryJob,
                max_retries: Some(3),
                timeout_seconds: 300,
                description: "Retry job after transient network issues".to_string(),
                ..Default::default()
            },
        ),
        (
            "UserErrorSourceBlobNotExists",
            PlaybookConfig {
                action: RecoveryAction::RerunPipeline,
                max_retries: Some(1),
                timeout_seconds: 600,
                description: "Rerun upstream pipeline to regenerate the missing source blob".to_string(),
                ..Default::default()
            },
        ),
        (
            "GatewayTimeout",
            PlaybookConfig {
                action: RecoveryAction::RerunPipeline,
                max_retries: Some(3),
                timeout_seconds: 300,
                description: "Retry pipeline after gateway timeout".to_string(),
                ..Default::default()
            },
        ),
        (
            "HttpConnectionFailed",
            PlaybookConfig {
                action: RecoveryAction::RerunPipeline,
                max_retries: Some(3),
                timeout_seconds: 300,
                description: "Retry pipeline after connection failure".to_string(),
                ..Default::default()
            },
        ),
        (
            "InternalServerError",
            PlaybookConfig {
                action: RecoveryAction::RerunPipeline,
                max_retries: Some(2),
                timeout_seconds: 600,
                description: "Retry pipeline after internal server error".to_string(),
                ..Default::default()
            },
        ),
        (
            "ActivityThrottlingError",
            PlaybookConfig {
                action: RecoveryAction::RerunPipeline,
                max_retries: Some(3),
                timeout_seconds: 900,
                description: "Retry pipeline with backoff while throttled".to_string(),
                ..Default::default()
            },
        ),
    ]
}
