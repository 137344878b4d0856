//! Engine settings.
//!
//! Every knob is read once at startup. Environment keys map directly onto
//! field names (`AUTO_REMEDIATION_ENABLED` → `auto_remediation_enabled`),
//! so the engine is tuned the same way the platform scripts that feed it
//! are.

use crate::breaker::BreakerConfig;
use crate::error::{EngineError, EngineResult};
use remedy_types::{PlaybookConfig, RecoveryAction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Master gate. When off, `execute` returns a skip result without
    /// touching breakers or adapters.
    #[serde(default)]
    pub auto_remediation_enabled: bool,

    /// Default primary-action retry budget for playbooks that omit one.
    #[serde(default = "default_max_retries")]
    pub auto_remediation_max_retries: u32,

    /// Exponential-backoff base delay between primary attempts.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_seconds: u64,

    /// Backoff cap.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_seconds: u64,

    /// Whether cluster scale-up is permitted at all.
    #[serde(default = "default_true")]
    pub auto_scale_enabled: bool,

    /// Hard cap on cluster workers after a scale-up.
    #[serde(default = "default_max_cluster_workers")]
    pub max_cluster_workers: u32,

    /// Scale-up step as a percentage of the current worker count.
    #[serde(default = "default_scale_up_percentage")]
    pub scale_up_percentage: u32,

    /// Whether cluster restart is permitted at all.
    #[serde(default = "default_true")]
    pub auto_restart_enabled: bool,

    /// How long a restarted cluster may take to reach RUNNING.
    #[serde(default = "default_restart_timeout_minutes")]
    pub restart_timeout_minutes: u64,

    /// Whether breakers gate executions. When off, every request is
    /// admitted and no outcomes are recorded.
    #[serde(default = "default_true")]
    pub circuit_breaker_enabled: bool,

    /// Default consecutive-failure threshold for playbooks that omit one.
    #[serde(default = "default_breaker_threshold")]
    pub circuit_breaker_failure_threshold: u32,

    /// Default open-hold duration for playbooks that omit one.
    #[serde(default = "default_breaker_timeout")]
    pub circuit_breaker_timeout_seconds: u64,

    /// Whether post-action health verification runs at all.
    #[serde(default = "default_true")]
    pub health_check_enabled: bool,

    /// Default health-verification budget for playbooks that omit one.
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_seconds: u64,

    /// Floor on the verification budget for job and pipeline runs, which
    /// finish on a slower clock than cluster state transitions.
    #[serde(default = "default_job_completion_timeout")]
    pub job_completion_timeout_seconds: u64,

    /// Interval between health-verifier polls.
    #[serde(default = "default_health_poll_interval")]
    pub health_poll_interval_seconds: u64,

    /// Per-action feature flags. A disabled action short-circuits to a
    /// terminal failure without recording a breaker outcome.
    #[serde(default = "default_true")]
    pub enable_job_retry: bool,

    #[serde(default = "default_true")]
    pub enable_cluster_restart: bool,

    #[serde(default = "default_true")]
    pub enable_cluster_scaling: bool,

    #[serde(default = "default_true")]
    pub enable_library_fallback: bool,

    #[serde(default = "default_true")]
    pub enable_config_rollback: bool,

    #[serde(default = "default_true")]
    pub enable_pipeline_rerun: bool,

    /// Known-good version ladders tried by `library_fallback` when the
    /// playbook does not carry its own candidates.
    #[serde(default = "default_library_fallbacks")]
    pub library_version_fallbacks: HashMap<String, Vec<String>>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            auto_remediation_enabled: false,
            auto_remediation_max_retries: default_max_retries(),
            retry_base_delay_seconds: default_retry_base_delay(),
            retry_max_delay_seconds: default_retry_max_delay(),
            auto_scale_enabled: true,
            max_cluster_workers: default_max_cluster_workers(),
            scale_up_percentage: default_scale_up_percentage(),
            auto_restart_enabled: true,
            restart_timeout_minutes: default_restart_timeout_minutes(),
            circuit_breaker_enabled: true,
            circuit_breaker_failure_threshold: default_breaker_threshold(),
            circuit_breaker_timeout_seconds: default_breaker_timeout(),
            health_check_enabled: true,
            health_check_timeout_seconds: default_health_check_timeout(),
            job_completion_timeout_seconds: default_job_completion_timeout(),
            health_poll_interval_seconds: default_health_poll_interval(),
            enable_job_retry: true,
            enable_cluster_restart: true,
            enable_cluster_scaling: true,
            enable_library_fallback: true,
            enable_config_rollback: true,
            enable_pipeline_rerun: true,
            library_version_fallbacks: default_library_fallbacks(),
        }
    }
}

impl EngineSettings {
    /// Load settings from defaults, an optional file, and the environment.
    pub fn load(path: Option<&str>) -> EngineResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(
                config::Config::try_from(&EngineSettings::default())
                    .map_err(|e| EngineError::Configuration(e.to_string()))?,
            );

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(config::Environment::default().try_parsing(true));

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EngineError::Configuration(e.to_string()))
    }

    /// Settings suitable for tests and local demos: remediation on, no
    /// backoff sleeps.
    pub fn permissive() -> Self {
        Self {
            auto_remediation_enabled: true,
            retry_base_delay_seconds: 0,
            ..Default::default()
        }
    }

    /// Whether the feature flags admit this action.
    pub fn action_enabled(&self, action: RecoveryAction) -> bool {
        match action {
            RecoveryAction::RetryJob => self.enable_job_retry,
            RecoveryAction::RestartCluster => {
                self.enable_cluster_restart && self.auto_restart_enabled
            }
            RecoveryAction::ScaleCluster => self.enable_cluster_scaling && self.auto_scale_enabled,
            RecoveryAction::LibraryFallback => self.enable_library_fallback,
            RecoveryAction::RollbackConfig => self.enable_config_rollback,
            RecoveryAction::RerunPipeline => self.enable_pipeline_rerun,
            RecoveryAction::Noop => true,
        }
    }

    /// Primary retry budget for a playbook, applying the engine default.
    pub fn resolved_max_retries(&self, playbook: &PlaybookConfig) -> u32 {
        playbook
            .max_retries
            .unwrap_or(self.auto_remediation_max_retries)
    }

    /// Breaker tuning for a playbook, applying engine defaults.
    pub fn breaker_config(&self, playbook: &PlaybookConfig) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: playbook
                .circuit_breaker_threshold
                .unwrap_or(self.circuit_breaker_failure_threshold),
            open_timeout: Duration::from_secs(
                playbook
                    .circuit_breaker_timeout
                    .unwrap_or(self.circuit_breaker_timeout_seconds),
            ),
        }
    }

    /// Health-verification budget for one attempt of the given action.
    ///
    /// Run-producing actions get the job-completion floor; restarts get
    /// the restart window, since both routinely outlast the generic
    /// health budget.
    pub fn health_budget(&self, action: RecoveryAction, playbook: &PlaybookConfig) -> Duration {
        let base = playbook
            .health_check_timeout
            .unwrap_or(self.health_check_timeout_seconds);

        let floor = match action {
            RecoveryAction::RetryJob | RecoveryAction::RerunPipeline => {
                self.job_completion_timeout_seconds
            }
            RecoveryAction::RestartCluster => self.restart_timeout_minutes * 60,
            _ => 0,
        };

        Duration::from_secs(base.max(floor))
    }

    /// Backoff before retry attempt `attempt` (1-based), exponential and
    /// capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let delay = self
            .retry_base_delay_seconds
            .saturating_mul(1u64 << shift)
            .min(self.retry_max_delay_seconds);
        Duration::from_secs(delay)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    30
}

fn default_retry_max_delay() -> u64 {
    300
}

fn default_max_cluster_workers() -> u32 {
    10
}

fn default_scale_up_percentage() -> u32 {
    50
}

fn default_restart_timeout_minutes() -> u64 {
    10
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_timeout() -> u64 {
    300
}

fn default_health_check_timeout() -> u64 {
    60
}

fn default_job_completion_timeout() -> u64 {
    600
}

fn default_health_poll_interval() -> u64 {
    5
}

fn default_library_fallbacks() -> HashMap<String, Vec<String>> {
    let table = [
        ("pandas", &["2.1.0", "2.0.3", "1.5.3"][..]),
        ("numpy", &["1.24.3", "1.23.5", "1.22.4"]),
        ("scikit-learn", &["1.3.0", "1.2.2", "1.1.3"]),
        ("matplotlib", &["3.7.2", "3.6.3", "3.5.3"]),
        ("requests", &["2.31.0", "2.28.2", "2.27.1"]),
        ("pyspark", &["3.4.0", "3.3.2", "3.3.1"]),
    ];

    table
        .into_iter()
        .map(|(name, versions)| {
            (
                name.to_string(),
                versions.iter().map(|v| v.to_string()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_safe() {
        let settings = EngineSettings::default();
        assert!(!settings.auto_remediation_enabled);
        assert_eq!(settings.auto_remediation_max_retries, 3);
        assert_eq!(settings.circuit_breaker_failure_threshold, 5);
        assert!(settings.library_version_fallbacks.contains_key("pandas"));
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let settings = EngineSettings {
            retry_base_delay_seconds: 30,
            retry_max_delay_seconds: 300,
            ..Default::default()
        };

        assert_eq!(settings.backoff_delay(1), Duration::from_secs(30));
        assert_eq!(settings.backoff_delay(2), Duration::from_secs(60));
        assert_eq!(settings.backoff_delay(3), Duration::from_secs(120));
        assert_eq!(settings.backoff_delay(4), Duration::from_secs(240));
        assert_eq!(settings.backoff_delay(5), Duration::from_secs(300));
        assert_eq!(settings.backoff_delay(40), Duration::from_secs(300));
    }

    #[test]
    fn test_action_flags_compose_with_platform_gates() {
        let settings = EngineSettings {
            auto_scale_enabled: false,
            ..EngineSettings::permissive()
        };
        assert!(!settings.action_enabled(RecoveryAction::ScaleCluster));
        assert!(settings.action_enabled(RecoveryAction::RetryJob));
        assert!(settings.action_enabled(RecoveryAction::Noop));
    }

    #[test]
    fn test_playbook_overrides_win_over_defaults() {
        let settings = EngineSettings::default();
        let playbook = PlaybookConfig {
            max_retries: Some(1),
            circuit_breaker_threshold: Some(2),
            circuit_breaker_timeout: Some(30),
            ..Default::default()
        };

        assert_eq!(settings.resolved_max_retries(&playbook), 1);
        let breaker = settings.breaker_config(&playbook);
        assert_eq!(breaker.failure_threshold, 2);
        assert_eq!(breaker.open_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_health_budget_floors() {
        let settings = EngineSettings::default();
        let playbook = PlaybookConfig {
            health_check_timeout: Some(60),
            ..Default::default()
        };

        // Job runs wait on the completion clock, clusters on the generic one.
        assert_eq!(
            settings.health_budget(RecoveryAction::RetryJob, &playbook),
            Duration::from_secs(600)
        );
        assert_eq!(
            settings.health_budget(RecoveryAction::ScaleCluster, &playbook),
            Duration::from_secs(60)
        );
        assert_eq!(
            settings.health_budget(RecoveryAction::RestartCluster, &playbook),
            Duration::from_secs(600)
        );
    }
}
