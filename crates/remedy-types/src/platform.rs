//! Resource-state shapes reported by platform adapters.
//!
//! These mirror the wire forms of the source platforms (Databricks cluster
//! and run states, Data Factory pipeline statuses) closely enough that an
//! adapter can map API responses without translation tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of error a platform adapter can surface, as seen by callers.
///
/// The executor's retry policy keys off this: transient and throttled
/// errors are absorbed into the retry loop, the rest escalate immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    /// Temporary condition; the caller may retry.
    Transient,

    /// Unrecoverable condition; the caller must escalate.
    Permanent,

    /// The referenced resource does not exist.
    NotFound,

    /// Credentials rejected by the platform.
    AuthFailure,

    /// Rate limited; the platform supplied a retry-after hint.
    Throttled,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterErrorKind::Transient => write!(f, "transient"),
            AdapterErrorKind::Permanent => write!(f, "permanent"),
            AdapterErrorKind::NotFound => write!(f, "not_found"),
            AdapterErrorKind::AuthFailure => write!(f, "auth_failure"),
            AdapterErrorKind::Throttled => write!(f, "throttled"),
        }
    }
}

/// Kind of resource a snapshot or breaker key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cluster,
    Job,
    Pipeline,
}

/// Lifecycle state of a compute cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterLifecycleState {
    Pending,
    Running,
    Restarting,
    Resizing,
    Terminating,
    Terminated,
    Error,
    Unknown,
}

/// Cluster state as fetched from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStateInfo {
    /// Current lifecycle state.
    pub state: ClusterLifecycleState,

    /// Failure reason reported by the platform, if any. A running cluster
    /// carrying a termination reason is not healthy.
    pub termination_reason: Option<String>,

    /// Current worker count.
    pub worker_count: u32,
}

impl ClusterStateInfo {
    /// Running with no failure reason recorded.
    pub fn is_running_clean(&self) -> bool {
        self.state == ClusterLifecycleState::Running && self.termination_reason.is_none()
    }

    /// States the cluster cannot leave without intervention.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self.state,
            ClusterLifecycleState::Error
                | ClusterLifecycleState::Terminated
                | ClusterLifecycleState::Terminating
        )
    }
}

/// Lifecycle state of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunLifecycleState {
    Pending,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
}

/// Result state of a finished job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResultState {
    Success,
    Failed,
    Timedout,
    Canceled,
}

/// Job-run state as fetched from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStateInfo {
    /// Coarse lifecycle state.
    pub life_cycle_state: RunLifecycleState,

    /// Result state, present once the run has finished.
    pub result_state: Option<RunResultState>,

    /// Platform-supplied detail for failed runs.
    pub state_message: Option<String>,
}

impl RunStateInfo {
    /// The run has finished, one way or another.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.life_cycle_state,
            RunLifecycleState::Terminated
                | RunLifecycleState::Skipped
                | RunLifecycleState::InternalError
        )
    }

    /// The run finished successfully.
    pub fn is_success(&self) -> bool {
        self.life_cycle_state == RunLifecycleState::Terminated
            && self.result_state == Some(RunResultState::Success)
    }
}

/// Status of a data-factory pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineRunStatus {
    Queued,
    InProgress,
    Succeeded,
    Failed,
    Canceling,
    Cancelled,
}

/// Pipeline-run state as fetched from the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunStateInfo {
    /// Current run status.
    pub status: PipelineRunStatus,

    /// Error detail for failed runs.
    pub error: Option<String>,
}

impl PipelineRunStateInfo {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            PipelineRunStatus::Succeeded | PipelineRunStatus::Failed | PipelineRunStatus::Cancelled
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == PipelineRunStatus::Succeeded
    }
}

/// Outcome of a cluster scale operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaleOutcome {
    /// Worker count before the resize.
    pub previous_workers: u32,

    /// Worker count after the resize. Equal to `previous_workers` when the
    /// cluster was already at its cap, which the executor treats as a
    /// no-op success.
    pub new_workers: u32,
}
