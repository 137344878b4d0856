//! Error types for the remedy engine.
//!
//! Expected recovery failures never surface here; they are folded into
//! `PlaybookExecutionResult`. These errors cover programming and
//! configuration faults only.

use thiserror::Error;

/// Faults that abort engine construction or indicate misuse.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Settings failed to load or carried invalid values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A playbook references an action or parameter the engine cannot
    /// dispatch.
    #[error("invalid playbook for error type {error_type}: {reason}")]
    InvalidPlaybook { error_type: String, reason: String },

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
