//! Circuit-breaker fabric.
//!
//! One breaker per `(error_type, resource_id)` key, created lazily and
//! kept until an operator resets it. The fabric serializes decisions per
//! key; actions themselves never run under a breaker lock.

use chrono::{DateTime, Utc};
use remedy_types::{BreakerKey, BreakerSnapshot, CircuitState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Tuning for a single breaker decision, resolved per playbook.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit holds open before admitting a probe.
    pub open_timeout: Duration,
}

/// Outcome of asking a breaker for admission.
#[derive(Debug, Clone)]
pub struct AllowOutcome {
    /// Whether the request may proceed.
    pub allowed: bool,

    /// Breaker state after the decision.
    pub snapshot: BreakerSnapshot,
}

/// Circuit breaker for a single key.
pub struct CircuitBreaker {
    key: BreakerKey,
    inner: Mutex<BreakerInner>,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    total_failures: u64,
    total_successes: u64,
    opened_at: Option<Instant>,
    opened_at_utc: Option<DateTime<Utc>>,
    last_outcome_at: Option<DateTime<Utc>>,
    // HALF_OPEN admits exactly one probe; set while it is outstanding.
    probe_in_flight: bool,
    failure_threshold: u32,
    open_timeout: Duration,
}

impl CircuitBreaker {
    fn new(key: BreakerKey, config: BreakerConfig) -> Self {
        Self {
            key,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                total_failures: 0,
                total_successes: 0,
                opened_at: None,
                opened_at_utc: None,
                last_outcome_at: None,
                probe_in_flight: false,
                failure_threshold: config.failure_threshold,
                open_timeout: config.open_timeout,
            }),
        }
    }

    /// Decide whether a request may proceed. A rejection records nothing.
    pub fn allow(&self, config: BreakerConfig) -> AllowOutcome {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_threshold = config.failure_threshold;
        inner.open_timeout = config.open_timeout;

        let allowed = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= inner.open_timeout {
                    info!(key = %self.key, "circuit breaker half-open, admitting probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        };

        AllowOutcome {
            allowed,
            snapshot: inner.snapshot(&self.key),
        }
    }

    /// Record a successful recovery. Closes the circuit from any state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_successes += 1;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
        inner.last_outcome_at = Some(Utc::now());

        if inner.state != CircuitState::Closed {
            info!(key = %self.key, "circuit breaker closed after successful recovery");
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            inner.opened_at_utc = None;
        }
    }

    /// Record a failed recovery.
    pub fn record_failure(&self, config: BreakerConfig) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_threshold = config.failure_threshold;
        inner.open_timeout = config.open_timeout;
        inner.total_failures += 1;
        inner.consecutive_failures += 1;
        inner.probe_in_flight = false;
        inner.last_outcome_at = Some(Utc::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= inner.failure_threshold {
                    warn!(
                        key = %self.key,
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.open();
                }
            }
            CircuitState::HalfOpen => {
                warn!(key = %self.key, "probe failed, circuit breaker re-opened");
                inner.open();
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker closed and clear its counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        info!(key = %self.key, old_state = %inner.state, "circuit breaker reset");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
        inner.opened_at = None;
        inner.opened_at_utc = None;
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.inner.lock().unwrap().snapshot(&self.key)
    }
}

impl BreakerInner {
    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.opened_at_utc = Some(Utc::now());
    }

    fn snapshot(&self, key: &BreakerKey) -> BreakerSnapshot {
        let retry_in_seconds = match self.state {
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                Some(self.open_timeout.saturating_sub(elapsed).as_secs())
            }
            _ => None,
        };

        BreakerSnapshot {
            key: key.clone(),
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            failure_threshold: self.failure_threshold,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
            opened_at: self.opened_at_utc,
            last_outcome_at: self.last_outcome_at,
            retry_in_seconds,
        }
    }
}

/// Process-wide map of breakers, keyed by `(error_type, resource_id)`.
pub struct CircuitBreakerFabric {
    breakers: RwLock<HashMap<BreakerKey, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerFabric {
    pub fn new() -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
        }
    }

    fn breaker(&self, key: &BreakerKey, config: BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().unwrap().get(key) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().unwrap();
        breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key.clone(), config)))
            .clone()
    }

    /// Decide admission for `key`, creating the breaker on first use.
    pub fn allow(&self, key: &BreakerKey, config: BreakerConfig) -> AllowOutcome {
        self.breaker(key, config).allow(config)
    }

    pub fn record_success(&self, key: &BreakerKey, config: BreakerConfig) {
        self.breaker(key, config).record_success();
    }

    pub fn record_failure(&self, key: &BreakerKey, config: BreakerConfig) {
        self.breaker(key, config).record_failure(config);
    }

    /// Force a breaker closed. Returns `false` when the key is unknown.
    pub fn reset(&self, key: &BreakerKey) -> bool {
        match self.breakers.read().unwrap().get(key) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, key: &BreakerKey) -> Option<BreakerSnapshot> {
        self.breakers
            .read()
            .unwrap()
            .get(key)
            .map(|b| b.snapshot())
    }

    /// Every breaker's state, sorted by key for stable operator output.
    pub fn snapshot_all(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .read()
            .unwrap()
            .values()
            .map(|b| b.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
        snapshots
    }
}

impl Default for CircuitBreakerFabric {
    fn default() -> Self {
        Self::new()
    }
}
