//! Platform adapter contract.
//!
//! The executor drives recoveries through this capability interface; real
//! Databricks and Data Factory clients plug in behind it. The simulated
//! adapter shipped here is the default wiring for local operation and the
//! test double for the executor suite.

use async_trait::async_trait;
use remedy_types::{
    AdapterErrorKind, ClusterLifecycleState, ClusterStateInfo, PipelineRunStateInfo,
    PipelineRunStatus, RunStateInfo, ScaleOutcome,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use thiserror::Error;

/// Errors surfaced by platform adapters, classified by how the caller
/// should react.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("transient platform error: {0}")]
    Transient(String),

    #[error("permanent platform error: {0}")]
    Permanent(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("throttled by platform, retry after {retry_after_seconds}s")]
    Throttled { retry_after_seconds: u64 },
}

impl AdapterError {
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            AdapterError::Transient(_) => AdapterErrorKind::Transient,
            AdapterError::Permanent(_) => AdapterErrorKind::Permanent,
            AdapterError::NotFound(_) => AdapterErrorKind::NotFound,
            AdapterError::AuthFailure(_) => AdapterErrorKind::AuthFailure,
            AdapterError::Throttled { .. } => AdapterErrorKind::Throttled,
        }
    }

    /// Whether the executor's retry loop may absorb this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::Transient(_) | AdapterError::Throttled { .. }
        )
    }

    /// Platform-requested minimum delay before retrying, if any.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            AdapterError::Throttled {
                retry_after_seconds,
            } => Some(std::time::Duration::from_secs(*retry_after_seconds)),
            _ => None,
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Capability set a platform must expose for its resources to be
/// recoverable. All calls honor caller-supplied deadlines (the executor
/// bounds every invocation with a timeout).
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Trigger a fresh run of the job; returns the new run id.
    async fn retry_job(&self, job_id: &str) -> AdapterResult<String>;

    /// Issue a cluster restart. Returns once the platform acknowledges;
    /// reaching RUNNING is the health verifier's business.
    async fn restart_cluster(&self, cluster_id: &str) -> AdapterResult<()>;

    /// Grow the cluster's worker pool by `delta_percent`, bounded by
    /// `cap`. Returns the previous and new counts.
    async fn scale_cluster(
        &self,
        cluster_id: &str,
        delta_percent: u32,
        cap: u32,
    ) -> AdapterResult<ScaleOutcome>;

    /// Install the first candidate version the platform accepts; the list
    /// is closed, so exhausting it is a failure. Returns the installed
    /// version.
    async fn library_fallback(
        &self,
        cluster_id: &str,
        library_name: &str,
        candidate_versions: &[String],
    ) -> AdapterResult<String>;

    /// Re-trigger a pipeline run; returns the new run id.
    async fn rerun_pipeline(
        &self,
        pipeline_name: &str,
        factory_name: &str,
        resource_group: &str,
    ) -> AdapterResult<String>;

    /// Fetch current cluster state.
    async fn get_cluster_state(&self, cluster_id: &str) -> AdapterResult<ClusterStateInfo>;

    /// Fetch current job-run state.
    async fn get_run_state(&self, run_id: &str) -> AdapterResult<RunStateInfo>;

    /// Fetch current pipeline-run state.
    async fn get_pipeline_run_state(&self, run_id: &str)
        -> AdapterResult<PipelineRunStateInfo>;

    /// Fetch the cluster configuration document used for snapshots.
    async fn get_cluster_config(&self, cluster_id: &str) -> AdapterResult<Value>;

    /// Restore a previously captured cluster configuration.
    async fn restore_cluster_config(
        &self,
        cluster_id: &str,
        config: &Value,
    ) -> AdapterResult<()>;
}

/// Deterministic in-process platform.
///
/// Mutating calls consume scripted outcomes when any are queued and fall
/// back to always-succeeding defaults; state fetches walk queued state
/// sequences so poll loops can be driven step by step. Every call is
/// recorded for assertions.
pub struct SimulatedPlatformAdapter {
    state: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    next_run: u64,
    clusters: HashMap<String, SimCluster>,
    runs: HashMap<String, VecDeque<RunStateInfo>>,
    pipeline_runs: HashMap<String, VecDeque<PipelineRunStateInfo>>,
    retry_job_script: VecDeque<AdapterResult<String>>,
    restart_script: VecDeque<AdapterResult<()>>,
    scale_script: VecDeque<AdapterResult<ScaleOutcome>>,
    rerun_script: VecDeque<AdapterResult<String>>,
    restore_script: VecDeque<AdapterResult<()>>,
    // library -> versions the platform will accept; absent means the
    // first candidate installs.
    library_accepted: HashMap<String, Vec<String>>,
    calls: Vec<String>,
}

struct SimCluster {
    workers: u32,
    config: Value,
    states: VecDeque<ClusterStateInfo>,
}

impl SimCluster {
    fn new(workers: u32) -> Self {
        Self {
            workers,
            config: json!({ "num_workers": workers }),
            states: VecDeque::new(),
        }
    }

    fn steady_state(&self) -> ClusterStateInfo {
        ClusterStateInfo {
            state: ClusterLifecycleState::Running,
            termination_reason: None,
            worker_count: self.workers,
        }
    }
}

impl SimulatedPlatformAdapter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn with_cluster(self, cluster_id: &str, workers: u32) -> Self {
        self.add_cluster(cluster_id, workers);
        self
    }

    pub fn add_cluster(&self, cluster_id: &str, workers: u32) {
        let mut state = self.state.lock().unwrap();
        state
            .clusters
            .insert(cluster_id.to_string(), SimCluster::new(workers));
    }

    /// Queue a scripted outcome for the next `retry_job` call.
    pub fn queue_retry_job(&self, outcome: AdapterResult<String>) {
        self.state.lock().unwrap().retry_job_script.push_back(outcome);
    }

    /// Queue a scripted outcome for the next `restart_cluster` call.
    pub fn queue_restart(&self, outcome: AdapterResult<()>) {
        self.state.lock().unwrap().restart_script.push_back(outcome);
    }

    /// Queue a scripted outcome for the next `scale_cluster` call.
    pub fn queue_scale(&self, outcome: AdapterResult<ScaleOutcome>) {
        self.state.lock().unwrap().scale_script.push_back(outcome);
    }

    /// Queue a scripted outcome for the next `rerun_pipeline` call.
    pub fn queue_rerun_pipeline(&self, outcome: AdapterResult<String>) {
        self.state.lock().unwrap().rerun_script.push_back(outcome);
    }

    /// Queue a scripted outcome for the next `restore_cluster_config` call.
    pub fn queue_restore_config(&self, outcome: AdapterResult<()>) {
        self.state.lock().unwrap().restore_script.push_back(outcome);
    }

    /// Script the state sequence a run reports while polled. The final
    /// entry repeats once the sequence is consumed.
    pub fn set_run_states(&self, run_id: &str, states: Vec<RunStateInfo>) {
        self.state
            .lock()
            .unwrap()
            .runs
            .insert(run_id.to_string(), states.into());
    }

    /// Script the state sequence a pipeline run reports while polled.
    pub fn set_pipeline_run_states(&self, run_id: &str, states: Vec<PipelineRunStateInfo>) {
        self.state
            .lock()
            .unwrap()
            .pipeline_runs
            .insert(run_id.to_string(), states.into());
    }

    /// Script the state sequence a cluster reports while polled. Once
    /// consumed, the cluster reports steady RUNNING at its worker count.
    pub fn push_cluster_states(&self, cluster_id: &str, states: Vec<ClusterStateInfo>) {
        let mut sim = self.state.lock().unwrap();
        let cluster = sim
            .clusters
            .entry(cluster_id.to_string())
            .or_insert_with(|| SimCluster::new(4));
        cluster.states.extend(states);
    }

    /// Restrict which versions of a library the platform will install.
    /// An empty list rejects every candidate.
    pub fn set_library_accepted(&self, library_name: &str, versions: Vec<&str>) {
        self.state.lock().unwrap().library_accepted.insert(
            library_name.to_string(),
            versions.into_iter().map(String::from).collect(),
        );
    }

    /// Every call made against this adapter, in order, as
    /// `method:primary_arg` strings.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls to the named method.
    pub fn call_count(&self, method: &str) -> usize {
        let prefix = format!("{method}:");
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix) || c.as_str() == method)
            .count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn next_run_id(state: &mut SimState, prefix: &str) -> String {
        state.next_run += 1;
        format!("{prefix}-{}", state.next_run)
    }
}

impl Default for SimulatedPlatformAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for SimulatedPlatformAdapter {
    async fn retry_job(&self, job_id: &str) -> AdapterResult<String> {
        self.record(format!("retry_job:{job_id}"));
        let mut state = self.state.lock().unwrap();

        if let Some(outcome) = state.retry_job_script.pop_front() {
            return outcome;
        }

        let run_id = Self::next_run_id(&mut state, "run");
        state.runs.entry(run_id.clone()).or_insert_with(|| {
            VecDeque::from(vec![RunStateInfo {
                life_cycle_state: remedy_types::RunLifecycleState::Terminated,
                result_state: Some(remedy_types::RunResultState::Success),
                state_message: None,
            }])
        });
        Ok(run_id)
    }

    async fn restart_cluster(&self, cluster_id: &str) -> AdapterResult<()> {
        self.record(format!("restart_cluster:{cluster_id}"));
        let mut state = self.state.lock().unwrap();

        if let Some(outcome) = state.restart_script.pop_front() {
            return outcome;
        }

        state
            .clusters
            .entry(cluster_id.to_string())
            .or_insert_with(|| SimCluster::new(4));
        Ok(())
    }

    async fn scale_cluster(
        &self,
        cluster_id: &str,
        delta_percent: u32,
        cap: u32,
    ) -> AdapterResult<ScaleOutcome> {
        self.record(format!("scale_cluster:{cluster_id}"));
        let mut state = self.state.lock().unwrap();

        if let Some(outcome) = state.scale_script.pop_front() {
            return outcome;
        }

        let cluster = state
            .clusters
            .entry(cluster_id.to_string())
            .or_insert_with(|| SimCluster::new(4));

        let previous = cluster.workers;
        let grown = (previous * (100 + delta_percent)).div_ceil(100);
        let new = grown.min(cap);
        cluster.workers = new;
        cluster.config = json!({ "num_workers": new });

        Ok(ScaleOutcome {
            previous_workers: previous,
            new_workers: new,
        })
    }

    async fn library_fallback(
        &self,
        cluster_id: &str,
        library_name: &str,
        candidate_versions: &[String],
    ) -> AdapterResult<String> {
        self.record(format!("library_fallback:{cluster_id}"));
        let state = self.state.lock().unwrap();

        match state.library_accepted.get(library_name) {
            None => candidate_versions.first().cloned().ok_or_else(|| {
                AdapterError::Permanent(format!("no candidate versions for {library_name}"))
            }),
            Some(accepted) => candidate_versions
                .iter()
                .find(|v| accepted.contains(v))
                .cloned()
                .ok_or_else(|| {
                    AdapterError::Permanent(format!(
                        "no candidate version of {library_name} accepted"
                    ))
                }),
        }
    }

    async fn rerun_pipeline(
        &self,
        pipeline_name: &str,
        _factory_name: &str,
        _resource_group: &str,
    ) -> AdapterResult<String> {
        self.record(format!("rerun_pipeline:{pipeline_name}"));
        let mut state = self.state.lock().unwrap();

        if let Some(outcome) = state.rerun_script.pop_front() {
            return outcome;
        }

        let run_id = Self::next_run_id(&mut state, "pipeline-run");
        state
            .pipeline_runs
            .entry(run_id.clone())
            .or_insert_with(|| {
                VecDeque::from(vec![PipelineRunStateInfo {
                    status: PipelineRunStatus::Succeeded,
                    error: None,
                }])
            });
        Ok(run_id)
    }

    async fn get_cluster_state(&self, cluster_id: &str) -> AdapterResult<ClusterStateInfo> {
        self.record(format!("get_cluster_state:{cluster_id}"));
        let mut state = self.state.lock().unwrap();

        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| AdapterError::NotFound(format!("cluster {cluster_id}")))?;

        if cluster.states.len() > 1 {
            Ok(cluster.states.pop_front().unwrap())
        } else if let Some(last) = cluster.states.front() {
            Ok(last.clone())
        } else {
            Ok(cluster.steady_state())
        }
    }

    async fn get_run_state(&self, run_id: &str) -> AdapterResult<RunStateInfo> {
        self.record(format!("get_run_state:{run_id}"));
        let mut state = self.state.lock().unwrap();

        let states = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| AdapterError::NotFound(format!("run {run_id}")))?;

        if states.len() > 1 {
            Ok(states.pop_front().unwrap())
        } else {
            states
                .front()
                .cloned()
                .ok_or_else(|| AdapterError::NotFound(format!("run {run_id}")))
        }
    }

    async fn get_pipeline_run_state(
        &self,
        run_id: &str,
    ) -> AdapterResult<PipelineRunStateInfo> {
        self.record(format!("get_pipeline_run_state:{run_id}"));
        let mut state = self.state.lock().unwrap();

        let states = state
            .pipeline_runs
            .get_mut(run_id)
            .ok_or_else(|| AdapterError::NotFound(format!("pipeline run {run_id}")))?;

        if states.len() > 1 {
            Ok(states.pop_front().unwrap())
        } else {
            states
                .front()
                .cloned()
                .ok_or_else(|| AdapterError::NotFound(format!("pipeline run {run_id}")))
        }
    }

    async fn get_cluster_config(&self, cluster_id: &str) -> AdapterResult<Value> {
        self.record(format!("get_cluster_config:{cluster_id}"));
        let state = self.state.lock().unwrap();

        state
            .clusters
            .get(cluster_id)
            .map(|c| c.config.clone())
            .ok_or_else(|| AdapterError::NotFound(format!("cluster {cluster_id}")))
    }

    async fn restore_cluster_config(
        &self,
        cluster_id: &str,
        config: &Value,
    ) -> AdapterResult<()> {
        self.record(format!("restore_cluster_config:{cluster_id}"));
        let mut state = self.state.lock().unwrap();

        if let Some(outcome) = state.restore_script.pop_front() {
            return outcome;
        }

        let cluster = state
            .clusters
            .get_mut(cluster_id)
            .ok_or_else(|| AdapterError::NotFound(format!("cluster {cluster_id}")))?;
        cluster.config = config.clone();
        if let Some(workers) = config.get("num_workers").and_then(Value::as_u64) {
            cluster.workers = workers as u32;
        }
        Ok(())
    }
}
