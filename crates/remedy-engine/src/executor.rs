//! Playbook executor.
//!
//! Orchestrates one recovery invocation end to end: breaker gate,
//! pre-action snapshot, the primary attempt loop with backoff, health
//! verification, the single fallback attempt, chained playbooks, outcome
//! recording, and best-effort rollback.

use crate::adapter::{AdapterError, PlatformAdapter};
use crate::breaker::CircuitBreakerFabric;
use crate::health::{HealthTarget, HealthVerifier};
use crate::registry::PlaybookRegistry;
use crate::settings::EngineSettings;
use crate::snapshot::SnapshotStore;
use remedy_types::{
    AdapterErrorKind, BreakerKey, ExecutionFailure, PlaybookConfig, PlaybookExecutionResult,
    RecoveryAction, RecoveryRequest, RequestMetadata, ResourceKind,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Maximum chained playbooks below the root request.
const MAX_CHAIN_DEPTH: usize = 3;

/// Failure of a single action attempt, before retry policy is applied.
struct AttemptFailure {
    failure: ExecutionFailure,
    message: String,
    retryable: bool,
    retry_after: Option<Duration>,
    // The platform accepted a mutating call before the attempt was
    // invalidated; makes the invocation a rollback candidate.
    mutated: bool,
}

/// Successful action attempt.
struct ActionOutcome {
    message: String,
    metadata: HashMap<String, Value>,
    health_target: Option<HealthTarget>,
}

enum AttemptVerdict {
    Success {
        outcome: ActionOutcome,
        health_passed: bool,
    },
    Failed(AttemptFailure),
}

/// Why an action invocation failed before producing an outcome.
enum AttemptError {
    Adapter(AdapterError),
    InvalidRequest(String),
    Timeout { seconds: u64 },
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Adapter(err) => err.is_retryable(),
            AttemptError::InvalidRequest(_) => false,
            AttemptError::Timeout { .. } => true,
        }
    }

    fn kind(&self) -> AdapterErrorKind {
        match self {
            AttemptError::Adapter(err) => err.kind(),
            AttemptError::InvalidRequest(_) => AdapterErrorKind::Permanent,
            AttemptError::Timeout { .. } => AdapterErrorKind::Transient,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AttemptError::Adapter(err) => err.retry_after(),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Adapter(err) => write!(f, "{err}"),
            AttemptError::InvalidRequest(reason) => write!(f, "{reason}"),
            AttemptError::Timeout { seconds } => {
                write!(f, "action timed out after {seconds}s")
            }
        }
    }
}

impl From<AdapterError> for AttemptError {
    fn from(err: AdapterError) -> Self {
        AttemptError::Adapter(err)
    }
}

/// The recovery orchestrator. One instance serves concurrent requests;
/// the breaker fabric is the only shared mutable state.
pub struct PlaybookExecutor {
    registry: Arc<PlaybookRegistry>,
    breakers: Arc<CircuitBreakerFabric>,
    adapter: Arc<dyn PlatformAdapter>,
    verifier: HealthVerifier,
    settings: Arc<EngineSettings>,
}

impl PlaybookExecutor {
    pub fn new(
        registry: Arc<PlaybookRegistry>,
        breakers: Arc<CircuitBreakerFabric>,
        adapter: Arc<dyn PlatformAdapter>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        let verifier = HealthVerifier::new(
            adapter.clone(),
            Duration::from_secs(settings.health_poll_interval_seconds),
        );
        Self {
            registry,
            breakers,
            adapter,
            verifier,
            settings,
        }
    }

    /// Shorten the health-poll interval, mainly for tests and demos.
    pub fn with_health_poll_interval(mut self, interval: Duration) -> Self {
        self.verifier = HealthVerifier::new(self.adapter.clone(), interval);
        self
    }

    /// Execute the playbook for a classified failure.
    ///
    /// Expected failure modes never raise; the returned result carries the
    /// full decision trail either way.
    #[instrument(skip(self, request), fields(error_type = %request.error_type))]
    pub async fn execute(&self, request: &RecoveryRequest) -> PlaybookExecutionResult {
        let started = Instant::now();

        if !self.settings.auto_remediation_enabled {
            debug!("auto-remediation disabled, skipping");
            let mut result = PlaybookExecutionResult::failed(
                ExecutionFailure::RemediationDisabled,
                "auto-remediation is disabled",
            );
            result.execution_time_seconds = started.elapsed().as_secs_f64();
            return result;
        }

        let mut visited = HashSet::new();
        let mut result = self.execute_inner(request, 0, &mut visited).await;
        result.execution_time_seconds = started.elapsed().as_secs_f64();

        info!(
            success = result.success,
            attempts = result.attempts,
            fallback = result.fallback_invoked,
            "playbook execution finished"
        );
        result
    }

    fn execute_inner<'a>(
        &'a self,
        request: &'a RecoveryRequest,
        depth: usize,
        visited: &'a mut HashSet<String>,
    ) -> Pin<Box<dyn Future<Output = PlaybookExecutionResult> + Send + 'a>> {
        Box::pin(async move {
            let started = Instant::now();
            let error_type = request.error_type.as_str();

            let Some(playbook) = self.registry.get(error_type).cloned() else {
                warn!(error_type, "no playbook configured");
                let mut result = PlaybookExecutionResult::failed(
                    ExecutionFailure::PlaybookNotFound {
                        error_type: error_type.to_string(),
                    },
                    format!("no playbook configured for error type {error_type}"),
                );
                result.execution_time_seconds = started.elapsed().as_secs_f64();
                return result;
            };

            visited.insert(error_type.to_string());

            info!(
                error_type,
                action = %playbook.action,
                description = %playbook.description,
                "starting playbook"
            );

            let mut result = PlaybookExecutionResult::new();
            let key = derive_breaker_key(error_type, playbook.action, &request.metadata);

            // Feature flags are checked before the breaker so a disabled
            // action never consumes a half-open probe slot.
            if !self.settings.action_enabled(playbook.action) {
                warn!(action = %playbook.action, "action disabled by feature flag");
                result.failure = Some(ExecutionFailure::ActionDisabled {
                    action: playbook.action,
                });
                result.message = format!("action {} is disabled", playbook.action);
                result.execution_time_seconds = started.elapsed().as_secs_f64();
                return result;
            }

            let breaker_enabled = self.settings.circuit_breaker_enabled;
            let breaker_cfg = self.settings.breaker_config(&playbook);

            if breaker_enabled {
                let admission = self.breakers.allow(&key, breaker_cfg);
                result.circuit_breaker_status = Some(admission.snapshot.clone());

                if !admission.allowed {
                    let retry_in = admission.snapshot.retry_in_seconds.unwrap_or(0);
                    warn!(key = %key, retry_in, "circuit breaker rejected request");
                    result.failure = Some(ExecutionFailure::CircuitOpen {
                        retry_in_seconds: retry_in,
                    });
                    result.message =
                        format!("circuit breaker open for {key}, retry in {retry_in}s");
                    result.execution_time_seconds = started.elapsed().as_secs_f64();
                    return result;
                }
            }

            let mut store = SnapshotStore::new();
            if playbook.snapshot_before {
                if let Some(cluster_id) = request.metadata.cluster_id.as_deref() {
                    if store.capture_cluster(self.adapter.as_ref(), cluster_id).await {
                        result.metadata.insert("snapshot_captured".into(), json!(true));
                    }
                }
            }

            let max_attempts = self.settings.resolved_max_retries(&playbook) + 1;
            let overall_budget = Duration::from_secs(playbook.timeout_seconds) * max_attempts
                + self.settings.health_budget(playbook.action, &playbook);
            let deadline = started + overall_budget;

            let mut primary_success = false;
            let mut mutated = false;
            let mut last_failure: Option<AttemptFailure> = None;

            for attempt in 1..=max_attempts {
                result.attempts = attempt;
                result
                    .actions_taken
                    .push(playbook.action.as_str().to_string());
                debug!(attempt, max_attempts, action = %playbook.action, "primary attempt");

                match self
                    .run_attempt(playbook.action, &playbook, request, &store)
                    .await
                {
                    AttemptVerdict::Success {
                        outcome,
                        health_passed,
                    } => {
                        result.health_check_passed = health_passed;
                        result.metadata.extend(outcome.metadata);
                        result.message = outcome.message;
                        primary_success = true;
                        break;
                    }
                    AttemptVerdict::Failed(failure) => {
                        warn!(attempt, error = %failure.message, "primary attempt failed");
                        mutated = mutated || failure.mutated;
                        let retryable = failure.retryable;
                        let retry_after = failure.retry_after;
                        last_failure = Some(failure);

                        if !retryable {
                            debug!("error kind skips retries, escalating");
                            break;
                        }
                        if attempt < max_attempts {
                            let delay = self
                                .settings
                                .backoff_delay(attempt)
                                .max(retry_after.unwrap_or(Duration::ZERO));
                            if Instant::now() + delay >= deadline {
                                warn!("overall execution deadline exhausted, escalating");
                                break;
                            }
                            if !delay.is_zero() {
                                debug!(delay_secs = delay.as_secs(), "backing off before retry");
                                sleep(delay).await;
                            }
                        }
                    }
                }
            }

            if primary_success {
                if breaker_enabled {
                    self.breakers.record_success(&key, breaker_cfg);
                }
                result.success = true;

                if let Some(chain_target) = playbook.chained_playbook.clone() {
                    let chained = self
                        .run_chained(&chain_target, request, depth, visited)
                        .await;

                    result
                        .actions_taken
                        .extend(chained.actions_taken.iter().cloned());
                    result.success = result.success && chained.success;
                    result.message = if chained.success {
                        format!("{} | chained playbook {chain_target} succeeded", result.message)
                    } else {
                        format!(
                            "{} | chained playbook {chain_target} failed: {}",
                            result.message, chained.message
                        )
                    };
                    result.chained_result = Some(Box::new(chained));
                }
            } else {
                let primary_message = last_failure
                    .as_ref()
                    .map(|f| f.message.clone())
                    .unwrap_or_else(|| "primary action failed".to_string());
                let mut recovered = false;

                if let Some(fallback) = playbook.fallback_action {
                    if self.settings.action_enabled(fallback) {
                        info!(fallback = %fallback, "primary exhausted, attempting fallback");
                        result.fallback_invoked = true;
                        result.actions_taken.push(fallback.as_str().to_string());

                        match self.run_attempt(fallback, &playbook, request, &store).await {
                            AttemptVerdict::Success {
                                outcome,
                                health_passed,
                            } => {
                                result.health_check_passed = health_passed;
                                result.metadata.extend(outcome.metadata);
                                result.message = format!(
                                    "{primary_message} | fallback {fallback} succeeded: {}",
                                    outcome.message
                                );
                                recovered = true;
                            }
                            AttemptVerdict::Failed(failure) => {
                                warn!(fallback = %fallback, error = %failure.message, "fallback also failed");
                                mutated = mutated || failure.mutated;
                                result.message = format!(
                                    "{primary_message} | fallback {fallback} also failed: {}",
                                    failure.message
                                );
                            }
                        }
                    } else {
                        warn!(fallback = %fallback, "fallback disabled by feature flag, skipping");
                        result.message = primary_message.clone();
                    }
                } else {
                    result.message = primary_message.clone();
                }

                if recovered {
                    if breaker_enabled {
                        self.breakers.record_success(&key, breaker_cfg);
                    }
                    result.success = true;
                } else {
                    if breaker_enabled {
                        self.breakers.record_failure(&key, breaker_cfg);
                    }
                    result.failure = Some(
                        last_failure
                            .map(|f| f.failure)
                            .unwrap_or(ExecutionFailure::ActionFailed {
                                kind: AdapterErrorKind::Permanent,
                            }),
                    );

                    if mutated && !store.is_empty() {
                        info!("terminal failure after mutation, attempting rollback");
                        result.rollback = store.rollback_cluster(self.adapter.as_ref()).await;
                    }
                }
            }

            if breaker_enabled {
                result.circuit_breaker_status = self.breakers.snapshot(&key);
            }
            result.execution_time_seconds = started.elapsed().as_secs_f64();
            result
        })
    }

    async fn run_chained(
        &self,
        chain_target: &str,
        request: &RecoveryRequest,
        depth: usize,
        visited: &mut HashSet<String>,
    ) -> PlaybookExecutionResult {
        if visited.contains(chain_target) {
            warn!(chain_target, "chain cycle detected, refusing");
            return PlaybookExecutionResult::failed(
                ExecutionFailure::ChainAborted {
                    reason: format!("cycle: {chain_target} already executed in this invocation"),
                },
                format!("chained playbook {chain_target} refused: cycle detected"),
            );
        }
        if depth + 1 > MAX_CHAIN_DEPTH {
            warn!(chain_target, depth, "chain depth bound reached, refusing");
            return PlaybookExecutionResult::failed(
                ExecutionFailure::ChainAborted {
                    reason: format!("chain depth bound ({MAX_CHAIN_DEPTH}) reached"),
                },
                format!("chained playbook {chain_target} refused: depth bound reached"),
            );
        }

        let chain_request = RecoveryRequest {
            error_type: chain_target.to_string(),
            ticket_id: request.ticket_id.clone(),
            metadata: request.metadata.clone(),
        };
        self.execute_inner(&chain_request, depth + 1, visited).await
    }

    /// One bounded attempt of `action`, including its health check. A
    /// failed health check invalidates the attempt.
    async fn run_attempt(
        &self,
        action: RecoveryAction,
        playbook: &PlaybookConfig,
        request: &RecoveryRequest,
        store: &SnapshotStore,
    ) -> AttemptVerdict {
        let budget = Duration::from_secs(playbook.timeout_seconds);

        let outcome = match timeout(budget, self.do_action(action, playbook, request, store)).await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                return AttemptVerdict::Failed(AttemptFailure {
                    failure: ExecutionFailure::ActionFailed { kind: err.kind() },
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                    retry_after: err.retry_after(),
                    mutated: false,
                });
            }
            Err(_) => {
                let err = AttemptError::Timeout {
                    seconds: budget.as_secs(),
                };
                return AttemptVerdict::Failed(AttemptFailure {
                    failure: ExecutionFailure::ActionFailed { kind: err.kind() },
                    message: err.to_string(),
                    retryable: true,
                    retry_after: None,
                    mutated: false,
                });
            }
        };

        let verify = playbook.verify_health && self.settings.health_check_enabled;
        let target = match (&outcome.health_target, verify) {
            (Some(target), true) => target.clone(),
            _ => {
                return AttemptVerdict::Success {
                    outcome,
                    health_passed: false,
                };
            }
        };

        let health_budget = self.settings.health_budget(action, playbook);
        let verdict = self.verifier.verify(&target, health_budget).await;

        if verdict.healthy {
            AttemptVerdict::Success {
                outcome,
                health_passed: true,
            }
        } else {
            let failure = if verdict.timed_out {
                ExecutionFailure::HealthCheckTimeout {
                    timeout_seconds: health_budget.as_secs(),
                }
            } else {
                ExecutionFailure::HealthCheckFailed {
                    reason: verdict.reason.clone(),
                }
            };
            AttemptVerdict::Failed(AttemptFailure {
                failure,
                message: format!("{} but health check failed: {}", outcome.message, verdict.reason),
                retryable: true,
                retry_after: None,
                mutated: action.is_mutating(),
            })
        }
    }

    async fn do_action(
        &self,
        action: RecoveryAction,
        playbook: &PlaybookConfig,
        request: &RecoveryRequest,
        store: &SnapshotStore,
    ) -> Result<ActionOutcome, AttemptError> {
        let metadata = &request.metadata;

        match action {
            RecoveryAction::RetryJob => {
                let job_id = require(metadata.job_id.as_deref(), "no job_id available for retry")?;
                let new_run_id = self.adapter.retry_job(job_id).await?;
                info!(job_id, new_run_id = %new_run_id, "job retry triggered");

                Ok(ActionOutcome {
                    message: format!("job {job_id} retry triggered, new run {new_run_id}"),
                    metadata: HashMap::from([("new_run_id".to_string(), json!(new_run_id))]),
                    health_target: Some(HealthTarget::JobRun { run_id: new_run_id }),
                })
            }

            RecoveryAction::RestartCluster => {
                let cluster_id = require(
                    metadata.cluster_id.as_deref(),
                    "no cluster_id available for restart",
                )?;
                self.adapter.restart_cluster(cluster_id).await?;
                info!(cluster_id, "cluster restart acknowledged");

                Ok(ActionOutcome {
                    message: format!("cluster {cluster_id} restart acknowledged"),
                    metadata: HashMap::from([("cluster_id".to_string(), json!(cluster_id))]),
                    health_target: Some(HealthTarget::Cluster {
                        cluster_id: cluster_id.to_string(),
                        min_workers: None,
                    }),
                })
            }

            RecoveryAction::ScaleCluster => {
                let cluster_id = require(
                    metadata.cluster_id.as_deref(),
                    "no cluster_id available for scaling",
                )?;
                let delta = param_u32(playbook, "delta_percent")
                    .unwrap_or(self.settings.scale_up_percentage);
                let cap =
                    param_u32(playbook, "max_workers").unwrap_or(self.settings.max_cluster_workers);

                let outcome = self.adapter.scale_cluster(cluster_id, delta, cap).await?;
                let message = if outcome.new_workers == outcome.previous_workers {
                    // Already at the cap; counted as a no-op success.
                    format!(
                        "cluster {cluster_id} already at capacity ({} workers)",
                        outcome.new_workers
                    )
                } else {
                    format!(
                        "cluster {cluster_id} scaled from {} to {} workers",
                        outcome.previous_workers, outcome.new_workers
                    )
                };
                info!(cluster_id, previous = outcome.previous_workers, new = outcome.new_workers, "cluster scaled");

                Ok(ActionOutcome {
                    message,
                    metadata: HashMap::from([
                        (
                            "previous_workers".to_string(),
                            json!(outcome.previous_workers),
                        ),
                        ("new_workers".to_string(), json!(outcome.new_workers)),
                    ]),
                    health_target: Some(HealthTarget::Cluster {
                        cluster_id: cluster_id.to_string(),
                        min_workers: Some(outcome.new_workers),
                    }),
                })
            }

            RecoveryAction::LibraryFallback => {
                let cluster_id = require(
                    metadata.cluster_id.as_deref(),
                    "no cluster_id available for library installation",
                )?;
                let spec = metadata
                    .library_name
                    .clone()
                    .or_else(|| extract_library_spec(metadata.error_message.as_deref()))
                    .ok_or_else(|| {
                        AttemptError::InvalidRequest(
                            "could not determine library from failure metadata".to_string(),
                        )
                    })?;
                let (library_name, failed_version) = parse_library_spec(&spec);

                let candidates = param_versions(playbook)
                    .or_else(|| {
                        self.settings
                            .library_version_fallbacks
                            .get(&library_name)
                            .cloned()
                    })
                    .ok_or_else(|| {
                        AttemptError::InvalidRequest(format!(
                            "no fallback versions configured for {library_name}"
                        ))
                    })?;
                let candidates: Vec<String> = candidates
                    .into_iter()
                    .filter(|v| Some(v.as_str()) != failed_version.as_deref())
                    .collect();
                if candidates.is_empty() {
                    return Err(AttemptError::InvalidRequest(format!(
                        "no untried fallback versions for {library_name}"
                    )));
                }

                let installed = self
                    .adapter
                    .library_fallback(cluster_id, &library_name, &candidates)
                    .await?;
                info!(cluster_id, library = %library_name, version = %installed, "library installed");

                Ok(ActionOutcome {
                    message: format!("installed {library_name}=={installed} on {cluster_id}"),
                    metadata: HashMap::from([
                        ("library_name".to_string(), json!(library_name)),
                        ("installed_version".to_string(), json!(installed)),
                    ]),
                    health_target: Some(HealthTarget::Cluster {
                        cluster_id: cluster_id.to_string(),
                        min_workers: None,
                    }),
                })
            }

            RecoveryAction::RerunPipeline => {
                let pipeline_name = require(
                    metadata.pipeline_name.as_deref(),
                    "no pipeline_name available for rerun",
                )?;
                let factory_name = metadata.factory_name.as_deref().unwrap_or_default();
                let resource_group = metadata.resource_group.as_deref().unwrap_or_default();

                let new_run_id = self
                    .adapter
                    .rerun_pipeline(pipeline_name, factory_name, resource_group)
                    .await?;
                info!(pipeline = pipeline_name, new_run_id = %new_run_id, "pipeline rerun triggered");

                Ok(ActionOutcome {
                    message: format!(
                        "pipeline {pipeline_name} rerun triggered, new run {new_run_id}"
                    ),
                    metadata: HashMap::from([("new_run_id".to_string(), json!(new_run_id))]),
                    health_target: Some(HealthTarget::PipelineRun { run_id: new_run_id }),
                })
            }

            RecoveryAction::RollbackConfig => {
                let snapshot = store.latest(ResourceKind::Cluster).ok_or_else(|| {
                    AttemptError::InvalidRequest(
                        "no snapshot available to roll back".to_string(),
                    )
                })?;

                self.adapter
                    .restore_cluster_config(&snapshot.resource_id, &snapshot.state)
                    .await?;
                info!(cluster_id = %snapshot.resource_id, "configuration rolled back");

                Ok(ActionOutcome {
                    message: format!(
                        "cluster {} restored to configuration captured at {}",
                        snapshot.resource_id, snapshot.captured_at
                    ),
                    metadata: HashMap::from([(
                        "restored_cluster_id".to_string(),
                        json!(snapshot.resource_id),
                    )]),
                    health_target: Some(HealthTarget::Cluster {
                        cluster_id: snapshot.resource_id.clone(),
                        min_workers: None,
                    }),
                })
            }

            RecoveryAction::Noop => Ok(ActionOutcome {
                message: "no-op action completed".to_string(),
                metadata: HashMap::new(),
                health_target: None,
            }),
        }
    }
}

fn require<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AttemptError> {
    value.ok_or_else(|| AttemptError::InvalidRequest(message.to_string()))
}

fn param_u32(playbook: &PlaybookConfig, key: &str) -> Option<u32> {
    playbook
        .action_params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as u32)
}

fn param_versions(playbook: &PlaybookConfig) -> Option<Vec<String>> {
    playbook
        .action_params
        .get("candidate_versions")
        .and_then(Value::as_array)
        .map(|versions| {
            versions
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
}

/// Derive the breaker key from the playbook's action and the request
/// metadata, degrading to `global` when the expected id is absent.
fn derive_breaker_key(
    error_type: &str,
    action: RecoveryAction,
    metadata: &RequestMetadata,
) -> BreakerKey {
    let resource_id = match action {
        RecoveryAction::RetryJob => metadata.job_id.as_deref(),
        RecoveryAction::RestartCluster
        | RecoveryAction::ScaleCluster
        | RecoveryAction::LibraryFallback
        | RecoveryAction::RollbackConfig => metadata.cluster_id.as_deref(),
        RecoveryAction::RerunPipeline => metadata.pipeline_name.as_deref(),
        RecoveryAction::Noop => None,
    };

    match resource_id {
        Some(id) => BreakerKey::new(error_type, id),
        None => BreakerKey::global(error_type),
    }
}

/// Split `pandas==2.2.0` into the library name and its pinned version.
/// Range operators yield the name alone.
fn parse_library_spec(spec: &str) -> (String, Option<String>) {
    for operator in ["==", ">=", "<=", "~=", ">", "<"] {
        if let Some((name, version)) = spec.split_once(operator) {
            let version = version.trim();
            let pinned = (operator == "==" && !version.is_empty()).then(|| version.to_string());
            return (name.trim().to_string(), pinned);
        }
    }
    (spec.trim().to_string(), None)
}

/// Pull a `requirement <spec>` fragment out of a pip-style error message.
fn extract_library_spec(error_message: Option<&str>) -> Option<String> {
    let message = error_message?;
    let rest = &message[message.find("requirement ")? + "requirement ".len()..];
    let spec: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || "._-=<>~!".contains(*c))
        .collect();
    (!spec.is_empty()).then_some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_with(cluster: Option<&str>, job: Option<&str>) -> RequestMetadata {
        RequestMetadata {
            cluster_id: cluster.map(String::from),
            job_id: job.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_breaker_key_follows_action_kind() {
        let metadata = RequestMetadata {
            job_id: Some("J".into()),
            cluster_id: Some("C".into()),
            pipeline_name: Some("P".into()),
            ..Default::default()
        };

        let key = derive_breaker_key("ET", RecoveryAction::RetryJob, &metadata);
        assert_eq!(key.resource_id, "J");

        let key = derive_breaker_key("ET", RecoveryAction::ScaleCluster, &metadata);
        assert_eq!(key.resource_id, "C");

        let key = derive_breaker_key("ET", RecoveryAction::RerunPipeline, &metadata);
        assert_eq!(key.resource_id, "P");
    }

    #[test]
    fn test_breaker_key_degrades_to_global() {
        let metadata = metadata_with(None, None);
        let key = derive_breaker_key("ET", RecoveryAction::RestartCluster, &metadata);
        assert_eq!(key.resource_id, "global");

        let key = derive_breaker_key("ET", RecoveryAction::Noop, &metadata);
        assert_eq!(key.resource_id, "global");
    }

    #[test]
    fn test_parse_library_spec() {
        assert_eq!(
            parse_library_spec("pandas==2.2.0"),
            ("pandas".to_string(), Some("2.2.0".to_string()))
        );
        assert_eq!(
            parse_library_spec("numpy>=1.24.0"),
            ("numpy".to_string(), None)
        );
        assert_eq!(
            parse_library_spec("scikit-learn"),
            ("scikit-learn".to_string(), None)
        );
    }

    #[test]
    fn test_extract_library_spec_from_error() {
        let message = "ERROR: Could not find a version that satisfies the requirement pandas==2.2.0 (from versions: none)";
        assert_eq!(
            extract_library_spec(Some(message)),
            Some("pandas==2.2.0".to_string())
        );
        assert_eq!(extract_library_spec(Some("executor lost")), None);
        assert_eq!(extract_library_spec(None), None);
    }
}
