//! End-to-end executor scenarios against the simulated platform.

use remedy_engine::adapter::{AdapterError, SimulatedPlatformAdapter};
use remedy_engine::breaker::CircuitBreakerFabric;
use remedy_engine::executor::PlaybookExecutor;
use remedy_engine::registry::PlaybookRegistry;
use remedy_engine::PlatformAdapter;
use remedy_engine::settings::EngineSettings;
use std::sync::Arc;
use std::time::Duration;

use remedy_types::{
    CircuitState, ClusterLifecycleState, ClusterStateInfo, ExecutionFailure, PlaybookConfig,
    RecoveryAction, RecoveryRequest, RequestMetadata, RunLifecycleState, RunResultState,
    RunStateInfo,
};

struct Harness {
    adapter: Arc<SimulatedPlatformAdapter>,
    breakers: Arc<CircuitBreakerFabric>,
    executor: PlaybookExecutor,
}

fn harness(registry: PlaybookRegistry, settings: EngineSettings) -> Harness {
    let adapter = Arc::new(SimulatedPlatformAdapter::new());
    let breakers = Arc::new(CircuitBreakerFabric::new());
    let executor = PlaybookExecutor::new(
        Arc::new(registry),
        breakers.clone(),
        adapter.clone(),
        Arc::new(settings),
    )
    .with_health_poll_interval(Duration::from_millis(5));

    Harness {
        adapter,
        breakers,
        executor,
    }
}

fn job_request(error_type: &str) -> RecoveryRequest {
    RecoveryRequest::new(error_type).with_metadata(RequestMetadata {
        job_id: Some("J".to_string()),
        run_id: Some("R".to_string()),
        cluster_id: Some("c1".to_string()),
        ..Default::default()
    })
}

fn successful_run() -> RunStateInfo {
    RunStateInfo {
        life_cycle_state: RunLifecycleState::Terminated,
        result_state: Some(RunResultState::Success),
        state_message: None,
    }
}

#[tokio::test]
async fn happy_retry_succeeds_on_first_attempt() {
    // S1: retry_job returns a new run that completes successfully.
    let h = harness(PlaybookRegistry::builtin(), EngineSettings::permissive());
    h.adapter.queue_retry_job(Ok("R2".to_string()));
    h.adapter.set_run_states("R2", vec![successful_run()]);

    let result = h
        .executor
        .execute(&job_request("DatabricksJobExecutionError"))
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.actions_taken, vec!["retry_job"]);
    assert!(!result.fallback_invoked);
    assert!(result.health_check_passed);
    assert_eq!(result.metadata["new_run_id"], "R2");

    let breaker = result.circuit_breaker_status.unwrap();
    assert_eq!(breaker.state, CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures, 0);
    assert_eq!(breaker.total_successes, 1);
}

#[tokio::test]
async fn fallback_recovers_after_primary_retries_exhaust() {
    // S2: four transient retry failures, then the scale fallback lands.
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksJobExecutionError",
        PlaybookConfig {
            action: RecoveryAction::RetryJob,
            max_retries: Some(3),
            timeout_seconds: 30,
            fallback_action: Some(RecoveryAction::ScaleCluster),
            description: "retry then scale".to_string(),
            ..Default::default()
        },
    )]);
    let h = harness(registry, EngineSettings::permissive());
    h.adapter.add_cluster("c1", 4);
    for _ in 0..4 {
        h.adapter
            .queue_retry_job(Err(AdapterError::Transient("spark context lost".into())));
    }

    let result = h
        .executor
        .execute(&job_request("DatabricksJobExecutionError"))
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.attempts, 4);
    assert!(result.fallback_invoked);
    assert_eq!(
        result.actions_taken,
        vec![
            "retry_job",
            "retry_job",
            "retry_job",
            "retry_job",
            "scale_cluster"
        ]
    );
    assert_eq!(result.metadata["new_workers"], 6);

    let breaker = result.circuit_breaker_status.unwrap();
    assert_eq!(breaker.state, CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures, 0);
}

#[tokio::test]
async fn circuit_opens_then_recovers_through_probe() {
    // S3: two terminal failures open the breaker, the third request is
    // blocked, and after the hold expires exactly one probe is admitted.
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksJobExecutionError",
        PlaybookConfig {
            action: RecoveryAction::RetryJob,
            max_retries: Some(0),
            timeout_seconds: 30,
            circuit_breaker_threshold: Some(2),
            circuit_breaker_timeout: Some(1),
            description: "retry with tight breaker".to_string(),
            ..Default::default()
        },
    )]);
    let h = harness(registry, EngineSettings::permissive());
    let request = job_request("DatabricksJobExecutionError");

    for _ in 0..2 {
        h.adapter
            .queue_retry_job(Err(AdapterError::Permanent("job deleted".into())));
        let result = h.executor.execute(&request).await;
        assert!(!result.success);
    }

    // Third request inside the hold window is rejected before the adapter.
    let calls_before = h.adapter.call_count("retry_job");
    let blocked = h.executor.execute(&request).await;
    assert!(!blocked.success);
    assert!(matches!(
        blocked.failure,
        Some(ExecutionFailure::CircuitOpen { .. })
    ));
    assert_eq!(blocked.attempts, 0);
    assert_eq!(h.adapter.call_count("retry_job"), calls_before);

    let snapshot = blocked.circuit_breaker_status.unwrap();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(snapshot.total_failures, 2);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // The next request is the probe; its success closes the circuit.
    h.adapter.queue_retry_job(Ok("R5".to_string()));
    h.adapter.set_run_states("R5", vec![successful_run()]);
    let probe = h.executor.execute(&request).await;
    assert!(probe.success, "{}", probe.message);

    let closed = probe.circuit_breaker_status.unwrap();
    assert_eq!(closed.state, CircuitState::Closed);
    assert_eq!(closed.consecutive_failures, 0);
}

#[tokio::test]
async fn scale_chain_retries_job_after_scaling() {
    // S4: OOM playbook scales the cluster, then chains into the job retry
    // playbook; the child's actions land after the parent's.
    let h = harness(PlaybookRegistry::builtin(), EngineSettings::permissive());
    h.adapter.add_cluster("c1", 4);

    let result = h
        .executor
        .execute(&job_request("DatabricksOutOfMemoryError"))
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.metadata["previous_workers"], 4);
    assert_eq!(result.metadata["new_workers"], 6);
    assert_eq!(result.actions_taken, vec!["scale_cluster", "retry_job"]);

    let chained = result.chained_result.as_ref().unwrap();
    assert!(chained.success);
    assert_eq!(chained.actions_taken, vec!["retry_job"]);
    assert!(chained.metadata.contains_key("new_run_id"));
}

#[tokio::test]
async fn library_fallback_exhausting_candidates_is_terminal() {
    // S5: every candidate version is rejected; the executor sees one
    // attempt and the breaker records one failure.
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksLibraryInstallationError",
        PlaybookConfig {
            action: RecoveryAction::LibraryFallback,
            max_retries: Some(0),
            timeout_seconds: 30,
            description: "library fallback only".to_string(),
            ..Default::default()
        },
    )]);
    let h = harness(registry, EngineSettings::permissive());
    h.adapter.add_cluster("c1", 4);
    h.adapter.set_library_accepted("pandas", vec![]);

    let request =
        RecoveryRequest::new("DatabricksLibraryInstallationError").with_metadata(RequestMetadata {
            cluster_id: Some("c1".to_string()),
            library_name: Some("pandas==2.2.0".to_string()),
            ..Default::default()
        });
    let result = h.executor.execute(&request).await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.actions_taken, vec!["library_fallback"]);
    assert!(!result.fallback_invoked);

    let breaker = result.circuit_breaker_status.unwrap();
    assert_eq!(breaker.total_failures, 1);
    assert_eq!(breaker.consecutive_failures, 1);
}

#[tokio::test]
async fn health_timeout_invalidates_attempts_until_budget_exhausts() {
    // S6: restart is acknowledged but the cluster never leaves RESTARTING;
    // each attempt fails its health check and the terminal result is a
    // health-check timeout.
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksClusterStartFailure",
        PlaybookConfig {
            action: RecoveryAction::RestartCluster,
            max_retries: Some(1),
            timeout_seconds: 30,
            health_check_timeout: Some(0),
            description: "restart with tight health budget".to_string(),
            ..Default::default()
        },
    )]);
    let settings = EngineSettings {
        restart_timeout_minutes: 0,
        ..EngineSettings::permissive()
    };
    let h = harness(registry, settings);
    h.adapter.add_cluster("c1", 4);
    h.adapter.push_cluster_states(
        "c1",
        vec![ClusterStateInfo {
            state: ClusterLifecycleState::Restarting,
            termination_reason: None,
            worker_count: 0,
        }],
    );

    let result = h
        .executor
        .execute(&job_request("DatabricksClusterStartFailure"))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.actions_taken, vec!["restart_cluster", "restart_cluster"]);
    assert!(!result.health_check_passed);
    assert!(matches!(
        result.failure,
        Some(ExecutionFailure::HealthCheckTimeout { .. })
    ));
}

#[tokio::test]
async fn unknown_error_type_returns_playbook_not_found() {
    let h = harness(PlaybookRegistry::builtin(), EngineSettings::permissive());

    let result = h
        .executor
        .execute(&RecoveryRequest::new("SomethingNovel"))
        .await;

    assert!(!result.success);
    assert!(matches!(
        result.failure,
        Some(ExecutionFailure::PlaybookNotFound { .. })
    ));
    assert!(result.actions_taken.is_empty());
    assert!(h.adapter.calls().is_empty());
}

#[tokio::test]
async fn remediation_gate_skips_without_touching_anything() {
    let settings = EngineSettings {
        auto_remediation_enabled: false,
        ..EngineSettings::permissive()
    };
    let h = harness(PlaybookRegistry::builtin(), settings);

    let result = h
        .executor
        .execute(&job_request("DatabricksJobExecutionError"))
        .await;

    assert!(!result.success);
    assert!(matches!(
        result.failure,
        Some(ExecutionFailure::RemediationDisabled)
    ));
    assert!(h.adapter.calls().is_empty());
    assert!(h.breakers.snapshot_all().is_empty());
}

#[tokio::test]
async fn disabled_action_fails_without_recording_breaker_outcome() {
    let settings = EngineSettings {
        enable_job_retry: false,
        ..EngineSettings::permissive()
    };
    let h = harness(PlaybookRegistry::builtin(), settings);

    let result = h
        .executor
        .execute(&job_request("DatabricksJobExecutionError"))
        .await;

    assert!(!result.success);
    assert!(matches!(
        result.failure,
        Some(ExecutionFailure::ActionDisabled {
            action: RecoveryAction::RetryJob
        })
    ));
    assert!(h.adapter.calls().is_empty());

    // An operator decision, not a system outcome: nothing recorded.
    for snapshot in h.breakers.snapshot_all() {
        assert_eq!(snapshot.total_failures, 0);
        assert_eq!(snapshot.total_successes, 0);
    }
}

#[tokio::test]
async fn disabled_health_check_skips_state_fetches() {
    // Invariant: verify_health off means no Get*State traffic at all.
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksJobExecutionError",
        PlaybookConfig {
            action: RecoveryAction::RetryJob,
            max_retries: Some(0),
            timeout_seconds: 30,
            verify_health: false,
            description: "retry without verification".to_string(),
            ..Default::default()
        },
    )]);
    let h = harness(registry, EngineSettings::permissive());

    let result = h
        .executor
        .execute(&job_request("DatabricksJobExecutionError"))
        .await;

    assert!(result.success);
    assert!(!result.health_check_passed);
    for call in h.adapter.calls() {
        assert!(
            !call.starts_with("get_"),
            "unexpected state fetch: {call}"
        );
    }
}

#[tokio::test]
async fn auth_failures_skip_the_retry_budget() {
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksJobExecutionError",
        PlaybookConfig {
            action: RecoveryAction::RetryJob,
            max_retries: Some(3),
            timeout_seconds: 30,
            description: "retry".to_string(),
            ..Default::default()
        },
    )]);
    let h = harness(registry, EngineSettings::permissive());
    h.adapter
        .queue_retry_job(Err(AdapterError::AuthFailure("token expired".into())));

    let result = h
        .executor
        .execute(&job_request("DatabricksJobExecutionError"))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(h.adapter.call_count("retry_job"), 1);
}

#[tokio::test]
async fn missing_required_metadata_is_not_retried() {
    let h = harness(PlaybookRegistry::builtin(), EngineSettings::permissive());

    let result = h
        .executor
        .execute(&RecoveryRequest::new("DatabricksJobExecutionError"))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert!(result.message.contains("no job_id"));
    assert!(h.adapter.calls().is_empty());
}

#[tokio::test]
async fn chain_cycles_are_refused() {
    let registry = PlaybookRegistry::with_playbooks([
        (
            "LoopA",
            PlaybookConfig {
                action: RecoveryAction::Noop,
                max_retries: Some(0),
                verify_health: false,
                chained_playbook: Some("LoopB".to_string()),
                description: "chains to B".to_string(),
                ..Default::default()
            },
        ),
        (
            "LoopB",
            PlaybookConfig {
                action: RecoveryAction::Noop,
                max_retries: Some(0),
                verify_health: false,
                chained_playbook: Some("LoopA".to_string()),
                description: "chains back to A".to_string(),
                ..Default::default()
            },
        ),
    ]);
    let h = harness(registry, EngineSettings::permissive());

    let result = h.executor.execute(&RecoveryRequest::new("LoopA")).await;

    // A and B both run once; B's chain back to A is refused.
    assert!(!result.success);
    let chained = result.chained_result.as_ref().unwrap();
    assert!(!chained.success);
    let aborted = chained.chained_result.as_ref().unwrap();
    assert!(matches!(
        aborted.failure,
        Some(ExecutionFailure::ChainAborted { .. })
    ));
}

#[tokio::test]
async fn rollback_runs_after_terminal_failure_of_mutating_action() {
    // Scale succeeds at the platform but the cluster never settles at the
    // new count; after retries exhaust, the captured config is restored.
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksResourceExhausted",
        PlaybookConfig {
            action: RecoveryAction::ScaleCluster,
            max_retries: Some(0),
            timeout_seconds: 30,
            snapshot_before: true,
            health_check_timeout: Some(0),
            description: "scale with rollback".to_string(),
            ..Default::default()
        },
    )]);
    let h = harness(registry, EngineSettings::permissive());
    h.adapter.add_cluster("c1", 4);
    // Cluster keeps reporting the old worker count.
    h.adapter.push_cluster_states(
        "c1",
        vec![ClusterStateInfo {
            state: ClusterLifecycleState::Running,
            termination_reason: None,
            worker_count: 4,
        }],
    );

    let result = h
        .executor
        .execute(&job_request("DatabricksResourceExhausted"))
        .await;

    assert!(!result.success);
    let rollback = result.rollback.as_ref().expect("rollback attempted");
    assert!(rollback.succeeded);
    assert_eq!(result.metadata["snapshot_captured"], true);

    // The restore put the captured config back.
    let config = h.adapter.get_cluster_config("c1").await.unwrap();
    assert_eq!(config["num_workers"], 4);
}

#[tokio::test]
async fn concurrent_requests_share_breaker_state_per_key() {
    let registry = PlaybookRegistry::with_playbooks([(
        "DatabricksJobExecutionError",
        PlaybookConfig {
            action: RecoveryAction::RetryJob,
            max_retries: Some(0),
            timeout_seconds: 30,
            verify_health: false,
            circuit_breaker_threshold: Some(3),
            description: "retry".to_string(),
            ..Default::default()
        },
    )]);
    let h = harness(registry, EngineSettings::permissive());
    let executor = Arc::new(h.executor);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(&job_request("DatabricksJobExecutionError"))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let snapshots = h.breakers.snapshot_all();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].total_successes, 4);
    assert_eq!(snapshots[0].state, CircuitState::Closed);
}
