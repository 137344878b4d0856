//! Recovery requests.

use crate::ids::TicketId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A classified failure handed to the orchestrator for recovery.
///
/// Classification happens upstream; the request carries only the resolved
/// error type and whatever resource metadata the alert surfaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRequest {
    /// Registry key selecting the playbook.
    pub error_type: String,

    /// Correlation id for audit trails.
    pub ticket_id: Option<TicketId>,

    /// Resource metadata extracted from the failure.
    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl RecoveryRequest {
    pub fn new(error_type: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            ticket_id: None,
            metadata: RequestMetadata::default(),
        }
    }

    pub fn with_ticket(mut self, ticket_id: TicketId) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Resource metadata attached to a recovery request. All fields are
/// optional; each action validates the ids it needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Job whose run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// The failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Cluster the failure occurred on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    /// Data-factory pipeline name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,

    /// Data-factory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory_name: Option<String>,

    /// Resource group owning the factory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,

    /// Library implicated in an installation failure, possibly with a
    /// pinned version (`pandas==2.2.0`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,

    /// Raw error message from the failed run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Anything else the alert carried.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_flattens_extras() {
        let raw = r#"{
            "error_type": "DatabricksJobExecutionError",
            "metadata": {
                "job_id": "J",
                "run_id": "R",
                "workspace_url": "https://adb.example.net"
            }
        }"#;

        let request: RecoveryRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.metadata.job_id.as_deref(), Some("J"));
        assert_eq!(
            request.metadata.extra.get("workspace_url").unwrap(),
            "https://adb.example.net"
        );
    }

    #[test]
    fn test_metadata_defaults_when_absent() {
        let request: RecoveryRequest =
            serde_json::from_str(r#"{"error_type": "GatewayTimeout"}"#).unwrap();
        assert!(request.metadata.pipeline_name.is_none());
        assert!(request.ticket_id.is_none());
    }
}
