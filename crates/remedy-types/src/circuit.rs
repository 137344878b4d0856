//! Circuit-breaker state shared between the engine and the operator
//! surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, recovery attempts flow normally.
    Closed,

    /// Circuit is open, recovery attempts are blocked.
    Open,

    /// Circuit is testing whether the resource has recovered; exactly one
    /// probe attempt is admitted.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Key scoping a circuit breaker: one breaker per error type per resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BreakerKey {
    /// Classified error type, e.g. `DatabricksJobExecutionError`.
    pub error_type: String,

    /// Primary resource id for the playbook's action, or `global` when the
    /// request metadata does not carry the expected id.
    pub resource_id: String,
}

impl BreakerKey {
    pub fn new(error_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Key for requests whose metadata lacks the expected resource id.
    pub fn global(error_type: impl Into<String>) -> Self {
        Self::new(error_type, "global")
    }

    /// Parse the `ErrorType:resource_id` wire form used by the operator API.
    pub fn parse(raw: &str) -> Option<Self> {
        let (error_type, resource_id) = raw.split_once(':')?;
        if error_type.is_empty() || resource_id.is_empty() {
            return None;
        }
        Some(Self::new(error_type, resource_id))
    }
}

impl fmt::Display for BreakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.error_type, self.resource_id)
    }
}

/// Point-in-time view of a single breaker, as reported to operators and
/// attached to execution results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    /// Breaker key.
    pub key: BreakerKey,

    /// Current state.
    pub state: CircuitState,

    /// Consecutive failures since the last success.
    pub consecutive_failures: u32,

    /// Failure count at which the breaker opens.
    pub failure_threshold: u32,

    /// Lifetime failure count.
    pub total_failures: u64,

    /// Lifetime success count.
    pub total_successes: u64,

    /// When the breaker last transitioned to open, if it is open.
    pub opened_at: Option<DateTime<Utc>>,

    /// When an outcome was last recorded on this breaker.
    pub last_outcome_at: Option<DateTime<Utc>>,

    /// Seconds until an open breaker admits a probe, if open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_round_trip() {
        let key = BreakerKey::new("DatabricksJobExecutionError", "job-42");
        let parsed = BreakerKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_key_parse_rejects_malformed() {
        assert!(BreakerKey::parse("no-separator").is_none());
        assert!(BreakerKey::parse(":missing-type").is_none());
        assert!(BreakerKey::parse("missing-resource:").is_none());
    }

    #[test]
    fn test_resource_ids_may_contain_colons() {
        // Only the first separator splits; ADF run ids can carry colons.
        let key = BreakerKey::parse("GatewayTimeout:factory:pipeline").unwrap();
        assert_eq!(key.error_type, "GatewayTimeout");
        assert_eq!(key.resource_id, "factory:pipeline");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
    }
}
