//! Shared types for the remedy auto-remediation engine.
//!
//! Everything that crosses a component boundary lives here: playbook
//! configuration, recovery requests and results, circuit-breaker state,
//! and the resource-state shapes reported by platform adapters.

pub mod action;
pub mod circuit;
pub mod ids;
pub mod platform;
pub mod playbook;
pub mod request;
pub mod result;

pub use action::RecoveryAction;
pub use circuit::{BreakerKey, BreakerSnapshot, CircuitState};
pub use ids::TicketId;
pub use platform::{
    AdapterErrorKind, ClusterLifecycleState, ClusterStateInfo, PipelineRunStateInfo,
    PipelineRunStatus, ResourceKind, RunLifecycleState, RunResultState, RunStateInfo, ScaleOutcome,
};
pub use playbook::{PlaybookConfig, PlaybookView};
pub use request::{RecoveryRequest, RequestMetadata};
pub use result::{ExecutionFailure, PlaybookExecutionResult, RollbackOutcome};
