//! Pre-action state snapshots.
//!
//! Snapshots are scoped to a single recovery invocation: captured before a
//! mutating action, consulted for best-effort rollback on terminal
//! failure, and dropped when the invocation completes.

use crate::adapter::PlatformAdapter;
use chrono::{DateTime, Utc};
use remedy_types::{ResourceKind, RollbackOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Captured state of one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Kind of resource captured.
    pub resource_kind: ResourceKind,

    /// Platform id of the resource.
    pub resource_id: String,

    /// Capture time.
    pub captured_at: DateTime<Utc>,

    /// Opaque platform-specific state document.
    pub state: Value,
}

/// Invocation-scoped snapshot collection.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: Vec<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the cluster's configuration. Best effort: a capture
    /// failure is logged and leaves the store unchanged.
    pub async fn capture_cluster(
        &mut self,
        adapter: &dyn PlatformAdapter,
        cluster_id: &str,
    ) -> bool {
        match adapter.get_cluster_config(cluster_id).await {
            Ok(state) => {
                info!(cluster_id = %cluster_id, "captured cluster snapshot");
                self.snapshots.push(Snapshot {
                    resource_kind: ResourceKind::Cluster,
                    resource_id: cluster_id.to_string(),
                    captured_at: Utc::now(),
                    state,
                });
                true
            }
            Err(err) => {
                warn!(cluster_id = %cluster_id, error = %err, "failed to capture snapshot");
                false
            }
        }
    }

    /// Most recent snapshot of the given kind.
    pub fn latest(&self, kind: ResourceKind) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.resource_kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Restore the most recent cluster snapshot. Best effort: the outcome
    /// annotates the result and never overrides the primary failure.
    pub async fn rollback_cluster(&self, adapter: &dyn PlatformAdapter) -> Option<RollbackOutcome> {
        let snapshot = self.latest(ResourceKind::Cluster)?;

        match adapter
            .restore_cluster_config(&snapshot.resource_id, &snapshot.state)
            .await
        {
            Ok(()) => {
                info!(cluster_id = %snapshot.resource_id, "rolled back cluster configuration");
                Some(RollbackOutcome {
                    succeeded: true,
                    message: format!(
                        "restored cluster {} to configuration captured at {}",
                        snapshot.resource_id, snapshot.captured_at
                    ),
                })
            }
            Err(err) => {
                warn!(
                    cluster_id = %snapshot.resource_id,
                    error = %err,
                    "rollback failed"
                );
                Some(RollbackOutcome {
                    succeeded: false,
                    message: format!("rollback of cluster {} failed: {err}", snapshot.resource_id),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterError, SimulatedPlatformAdapter};

    #[tokio::test]
    async fn test_capture_and_latest() {
        let adapter = SimulatedPlatformAdapter::new().with_cluster("c1", 4);
        let mut store = SnapshotStore::new();

        assert!(store.capture_cluster(&adapter, "c1").await);
        let snapshot = store.latest(ResourceKind::Cluster).unwrap();
        assert_eq!(snapshot.resource_id, "c1");
        assert_eq!(snapshot.state["num_workers"], 4);
    }

    #[tokio::test]
    async fn test_capture_missing_cluster_is_best_effort() {
        let adapter = SimulatedPlatformAdapter::new();
        let mut store = SnapshotStore::new();

        assert!(!store.capture_cluster(&adapter, "ghost").await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_restores_captured_config() {
        let adapter = SimulatedPlatformAdapter::new().with_cluster("c1", 4);
        let mut store = SnapshotStore::new();
        store.capture_cluster(&adapter, "c1").await;

        // Mutate, then roll back.
        adapter.scale_cluster("c1", 50, 10).await.unwrap();
        let outcome = store.rollback_cluster(&adapter).await.unwrap();
        assert!(outcome.succeeded);

        let config = adapter.get_cluster_config("c1").await.unwrap();
        assert_eq!(config["num_workers"], 4);
    }

    #[tokio::test]
    async fn test_rollback_failure_is_reported_not_raised() {
        let adapter = SimulatedPlatformAdapter::new().with_cluster("c1", 4);
        let mut store = SnapshotStore::new();
        store.capture_cluster(&adapter, "c1").await;

        adapter.queue_restore_config(Err(AdapterError::Transient("edit conflict".into())));
        let outcome = store.rollback_cluster(&adapter).await.unwrap();
        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("edit conflict"));
    }

    #[tokio::test]
    async fn test_rollback_without_snapshot_is_none() {
        let adapter = SimulatedPlatformAdapter::new();
        let store = SnapshotStore::new();
        assert!(store.rollback_cluster(&adapter).await.is_none());
    }
}
