//! Failure isolation around store operations.
//!
//! Two orthogonal controls in front of every store access: a circuit
//! breaker that fails fast after repeated backend failures, and a
//! bulkhead semaphore capping in-flight operations. Both reject before
//! the store is invoked. One guard instance is owned by one registry;
//! there is no shared global breaker state.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::telemetry::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Operations pass through; failures are counted.
    Closed,
    /// Operations fail immediately without touching the store.
    Open,
    /// One trial operation at a time probes the recovering backend.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

/// Tunable guard parameters.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial is admitted.
    pub recovery_timeout: Duration,
    /// Bulkhead cap on concurrent in-flight store operations.
    pub max_concurrent: usize,
    /// How long a caller waits for a bulkhead slot before failing.
    pub acquire_timeout: Duration,
    /// Poll interval of the background recovery monitor.
    pub monitor_interval: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(10),
            max_concurrent: 10,
            acquire_timeout: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(1),
        }
    }
}

/// Point-in-time guard health, for observability surfaces.
#[derive(Debug, Clone, Copy)]
pub struct GuardHealth {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Free bulkhead slots.
    pub available_permits: usize,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// True while the single half-open trial is in flight.
    trial_in_flight: bool,
}

/// Circuit breaker + bulkhead wrapping one registry's store accesses.
pub struct FailureGuard {
    /// Label for logs and metrics (the owning registry's agent kind).
    name: String,
    circuit: Mutex<CircuitInner>,
    bulkhead: Semaphore,
    config: GuardConfig,
}

impl FailureGuard {
    pub fn new(name: impl Into<String>, config: GuardConfig) -> Self {
        let bulkhead = Semaphore::new(config.max_concurrent);
        Self {
            name: name.into(),
            circuit: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
            bulkhead,
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Current circuit state, without side effects.
    pub fn state(&self) -> CircuitState {
        self.circuit.lock().expect("guard mutex poisoned").state
    }

    pub fn health(&self) -> GuardHealth {
        let inner = self.circuit.lock().expect("guard mutex poisoned");
        GuardHealth {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            available_permits: self.bulkhead.available_permits(),
        }
    }

    /// Execute a store operation under both controls.
    ///
    /// Admission order: circuit first, then bulkhead; the operation only
    /// runs once both admit. On success the failure streak resets; an
    /// [`Error::Store`] result is recorded as a failure before it
    /// propagates. Domain errors pass through without penalizing the
    /// circuit (the store round-trip itself succeeded).
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let trial = self.admit()?;

        let permit =
            match tokio::time::timeout(self.config.acquire_timeout, self.bulkhead.acquire()).await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    self.abandon_trial(trial);
                    return Err(Error::Other("bulkhead semaphore closed".to_string()));
                }
                Err(_) => {
                    self.abandon_trial(trial);
                    warn!(guard = %self.name, "bulkhead acquire timed out");
                    metrics::guard_rejections().add(
                        1,
                        &[
                            opentelemetry::KeyValue::new("guard", self.name.clone()),
                            opentelemetry::KeyValue::new("reason", "bulkhead_timeout"),
                        ],
                    );
                    return Err(Error::BulkheadTimeout);
                }
            };

        let started = std::time::Instant::now();
        let result = op().await;
        drop(permit);
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[opentelemetry::KeyValue::new("guard", self.name.clone())],
        );

        match &result {
            Err(e) if e.is_store_failure() => self.record_failure(trial),
            _ => self.record_success(trial),
        }
        result
    }

    /// Admission check: may the next operation reach the store?
    ///
    /// Returns whether the admitted operation is the half-open trial.
    /// An elapsed recovery timeout flips Open to HalfOpen here, so the
    /// circuit recovers under traffic even without the monitor.
    fn admit(&self) -> Result<bool> {
        let mut inner = self.circuit.lock().expect("guard mutex poisoned");
        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let recovered = inner
                    .last_failure_at
                    .is_some_and(|at| at.elapsed() >= self.config.recovery_timeout);
                if recovered {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.trial_in_flight = true;
                    Ok(true)
                } else {
                    self.reject_open();
                    Err(Error::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // At most one concurrent trial; the rest behave as Open.
                    self.reject_open();
                    Err(Error::CircuitOpen)
                } else {
                    inner.trial_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.circuit.lock().expect("guard mutex poisoned");
        inner.consecutive_failures = 0;
        if trial {
            inner.trial_in_flight = false;
        }
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.circuit.lock().expect("guard mutex poisoned");
        inner.last_failure_at = Some(Instant::now());
        if trial {
            // Failed trial: back to Open, recovery timer restarts.
            inner.trial_in_flight = false;
            self.transition(&mut inner, CircuitState::Open);
            return;
        }
        inner.consecutive_failures += 1;
        if inner.state == CircuitState::Closed
            && inner.consecutive_failures >= self.config.failure_threshold
        {
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    /// Release the trial slot when an admitted trial never ran
    /// (bulkhead rejection).
    fn abandon_trial(&self, trial: bool) {
        if trial {
            let mut inner = self.circuit.lock().expect("guard mutex poisoned");
            inner.trial_in_flight = false;
        }
    }

    /// One monitor pass: proactively flip Open to HalfOpen once the
    /// recovery timeout has elapsed, so the circuit self-heals without
    /// incoming traffic.
    pub fn poll_recovery(&self) {
        let mut inner = self.circuit.lock().expect("guard mutex poisoned");
        if inner.state == CircuitState::Open {
            let recovered = inner
                .last_failure_at
                .is_some_and(|at| at.elapsed() >= self.config.recovery_timeout);
            if recovered {
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }
    }

    /// Spawn the background recovery monitor. The task runs until the
    /// returned handle is aborted.
    pub fn spawn_monitor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(guard.config.monitor_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                guard.poll_recovery();
            }
        })
    }

    fn transition(&self, inner: &mut CircuitInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        match to {
            CircuitState::Open => {
                warn!(guard = %self.name, %from, "circuit breaker OPEN: store operations will be rejected");
            }
            CircuitState::HalfOpen => {
                info!(guard = %self.name, %from, "circuit breaker HALF-OPEN: probing store connectivity");
            }
            CircuitState::Closed => {
                info!(guard = %self.name, %from, "circuit breaker CLOSED: store operations restored");
            }
        }
        let attrs = [
            opentelemetry::KeyValue::new("guard", self.name.clone()),
            opentelemetry::KeyValue::new("from", from.to_string()),
            opentelemetry::KeyValue::new("to", to.to_string()),
        ];
        metrics::circuit_transitions().add(1, &attrs);
        metrics::circuit_open().record(
            u64::from(to == CircuitState::Open),
            &[opentelemetry::KeyValue::new("guard", self.name.clone())],
        );
    }

    fn reject_open(&self) {
        metrics::guard_rejections().add(
            1,
            &[
                opentelemetry::KeyValue::new("guard", self.name.clone()),
                opentelemetry::KeyValue::new("reason", "circuit_open"),
            ],
        );
    }
}
