//! Post-recovery health verification.
//!
//! After an action succeeds, the verifier polls the resource until it
//! reaches a terminal state or the budget runs out. A failed verification
//! invalidates the attempt that produced it.

use crate::adapter::{AdapterError, PlatformAdapter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// The resource a recovery attempt is verified against.
#[derive(Debug, Clone)]
pub enum HealthTarget {
    /// Wait for the cluster to run clean, optionally at a minimum worker
    /// count (set after a scale-up).
    Cluster {
        cluster_id: String,
        min_workers: Option<u32>,
    },

    /// Wait for a job run to terminate successfully.
    JobRun { run_id: String },

    /// Wait for a pipeline run to succeed.
    PipelineRun { run_id: String },
}

/// Verdict of a verification pass.
#[derive(Debug, Clone)]
pub struct HealthVerdict {
    pub healthy: bool,
    pub reason: String,
    pub timed_out: bool,
}

impl HealthVerdict {
    fn healthy(reason: impl Into<String>) -> Self {
        Self {
            healthy: true,
            reason: reason.into(),
            timed_out: false,
        }
    }

    fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            healthy: false,
            reason: reason.into(),
            timed_out: false,
        }
    }

    fn timeout(budget: Duration) -> Self {
        Self {
            healthy: false,
            reason: format!("timeout after {}s", budget.as_secs()),
            timed_out: true,
        }
    }
}

// One poll either settles the verdict or keeps waiting.
enum Poll {
    Settled(HealthVerdict),
    Pending(String),
}

/// Polls platform state until a resource is provably healthy or the
/// budget expires.
pub struct HealthVerifier {
    adapter: Arc<dyn PlatformAdapter>,
    poll_interval: Duration,
}

impl HealthVerifier {
    pub fn new(adapter: Arc<dyn PlatformAdapter>, poll_interval: Duration) -> Self {
        Self {
            adapter,
            poll_interval,
        }
    }

    /// Poll `target` until healthy, terminally unhealthy, or `budget`
    /// elapses.
    pub async fn verify(&self, target: &HealthTarget, budget: Duration) -> HealthVerdict {
        let started = Instant::now();

        loop {
            match self.poll_once(target).await {
                Poll::Settled(verdict) => {
                    debug!(
                        healthy = verdict.healthy,
                        reason = %verdict.reason,
                        "health verification settled"
                    );
                    return verdict;
                }
                Poll::Pending(state) => {
                    if started.elapsed() + self.poll_interval >= budget {
                        warn!(state = %state, "health verification budget exhausted");
                        return HealthVerdict::timeout(budget);
                    }
                    debug!(state = %state, "resource not yet settled, polling again");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn poll_once(&self, target: &HealthTarget) -> Poll {
        match target {
            HealthTarget::Cluster {
                cluster_id,
                min_workers,
            } => match self.adapter.get_cluster_state(cluster_id).await {
                Ok(info) => {
                    if let Some(reason) = &info.termination_reason {
                        return Poll::Settled(HealthVerdict::unhealthy(format!(
                            "cluster reported termination reason: {reason}"
                        )));
                    }
                    if info.is_terminal_failure() {
                        return Poll::Settled(HealthVerdict::unhealthy(format!(
                            "cluster in state {:?}",
                            info.state
                        )));
                    }
                    if info.is_running_clean() {
                        match min_workers {
                            Some(min) if info.worker_count < *min => Poll::Pending(format!(
                                "running with {}/{} workers",
                                info.worker_count, min
                            )),
                            _ => Poll::Settled(HealthVerdict::healthy(format!(
                                "cluster running with {} workers",
                                info.worker_count
                            ))),
                        }
                    } else {
                        Poll::Pending(format!("cluster state {:?}", info.state))
                    }
                }
                Err(err) => self.poll_error(err),
            },

            HealthTarget::JobRun { run_id } => match self.adapter.get_run_state(run_id).await {
                Ok(info) => {
                    if info.is_success() {
                        Poll::Settled(HealthVerdict::healthy("job run completed successfully"))
                    } else if info.is_terminal() {
                        let detail = info
                            .state_message
                            .unwrap_or_else(|| format!("{:?}", info.result_state));
                        Poll::Settled(HealthVerdict::unhealthy(format!(
                            "job run failed: {detail}"
                        )))
                    } else {
                        Poll::Pending(format!("run state {:?}", info.life_cycle_state))
                    }
                }
                Err(err) => self.poll_error(err),
            },

            HealthTarget::PipelineRun { run_id } => {
                match self.adapter.get_pipeline_run_state(run_id).await {
                    Ok(info) => {
                        if info.is_success() {
                            Poll::Settled(HealthVerdict::healthy("pipeline run succeeded"))
                        } else if info.is_terminal() {
                            let detail =
                                info.error.unwrap_or_else(|| format!("{:?}", info.status));
                            Poll::Settled(HealthVerdict::unhealthy(format!(
                                "pipeline run failed: {detail}"
                            )))
                        } else {
                            Poll::Pending(format!("pipeline status {:?}", info.status))
                        }
                    }
                    Err(err) => self.poll_error(err),
                }
            }
        }
    }

    // Transient fetch errors keep the poll loop alive; anything else is a
    // terminal verdict.
    fn poll_error(&self, err: AdapterError) -> Poll {
        if err.is_retryable() {
            Poll::Pending(format!("state fetch failed: {err}"))
        } else {
            Poll::Settled(HealthVerdict::unhealthy(format!(
                "state fetch failed: {err}"
            )))
        }
    }
}
