//! Per-dependency circuit breakers and their registry
//!
//! Every external call the engine makes goes through a named breaker. A
//! breaker counts failures inside a sliding window, opens once a threshold is
//! reached, rejects calls while open, and probes the dependency again through
//! a half-open phase after a timeout.

use crate::{config::BreakerConfig, EngineError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Calls flow through; failures are counted
    Closed,
    /// Calls are rejected without touching the dependency
    Open,
    /// A limited number of probe calls are allowed through
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    /// Breaker name (the dependency it guards)
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Failures currently inside the monitoring window
    pub failure_count: u32,
    /// Consecutive half-open successes
    pub success_count: u32,
}

/// Aggregate health of all registered breakers
#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    /// Total registered breakers
    pub total: usize,
    /// Breakers currently open
    pub open: usize,
    /// Breakers currently half-open
    pub half_open: usize,
    /// Breakers currently closed
    pub closed: usize,
    /// True when no breaker is open
    pub healthy: bool,
}

struct BreakerInner {
    state: CircuitState,
    /// Timestamps of recent failures; pruned to the monitoring window
    failures: VecDeque<Instant>,
    success_count: u32,
    opened_at: Option<Instant>,
}

/// Failure gate for one external dependency
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for the named dependency
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                success_count: 0,
                opened_at: None,
            }),
        }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// Whether a call would currently be allowed through. Side-effect-free:
    /// an elapsed open-timeout is reported as allowed but the transition to
    /// half-open only happens on an actual call.
    pub fn can_execute(&self) -> bool {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => inner
                .opened_at
                .map(|at| at.elapsed() >= self.open_timeout())
                .unwrap_or(true),
        }
    }

    /// Run `op` through the breaker. While open and inside the open-timeout
    /// the call is rejected with [`EngineError::BreakerOpen`] without
    /// invoking `op`; every other outcome of `op` is recorded against the
    /// breaker state.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.before_call()?;

        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    /// Operator override of the breaker state
    pub fn force_state(&self, state: CircuitState) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        warn!(breaker = %self.name, from = %inner.state, to = %state, "breaker state forced");
        inner.state = state;
        inner.failures.clear();
        inner.success_count = 0;
        inner.opened_at = match state {
            CircuitState::Open => Some(Instant::now()),
            _ => None,
        };
    }

    /// Reset to closed with all counters cleared
    pub fn reset(&self) {
        self.force_state(CircuitState::Closed);
    }

    /// Point-in-time status
    pub fn status(&self) -> BreakerStatus {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let window = self.monitoring_window();
        prune_failures(&mut inner.failures, window);
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failures.len() as u32,
            success_count: inner.success_count,
        }
    }

    fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.config.open_timeout_ms)
    }

    fn monitoring_window(&self) -> Duration {
        Duration::from_millis(self.config.monitoring_window_ms)
    }

    /// Gate a call. Transitions an open breaker whose timeout has elapsed to
    /// half-open; rejects otherwise while open.
    fn before_call(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.open_timeout())
                    .unwrap_or(true);
                if elapsed {
                    info!(breaker = %self.name, "open timeout elapsed, probing dependency");
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    metrics::counter!("arb_breaker_transitions_total", 1, "breaker" => self.name.clone(), "to" => "half_open");
                    Ok(())
                } else {
                    Err(EngineError::BreakerOpen(self.name.clone()).into())
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == CircuitState::HalfOpen {
            inner.success_count += 1;
            if inner.success_count >= self.config.success_threshold {
                info!(breaker = %self.name, "dependency recovered, closing breaker");
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.success_count = 0;
                inner.opened_at = None;
                metrics::counter!("arb_breaker_transitions_total", 1, "breaker" => self.name.clone(), "to" => "closed");
            }
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "probe call failed, reopening breaker");
                open(&mut inner, &self.name);
            }
            CircuitState::Closed => {
                let window = self.monitoring_window();
                inner.failures.push_back(Instant::now());
                prune_failures(&mut inner.failures, window);
                debug!(
                    breaker = %self.name,
                    failures = inner.failures.len(),
                    threshold = self.config.failure_threshold,
                    "dependency failure recorded"
                );
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    warn!(breaker = %self.name, "failure threshold reached, opening breaker");
                    open(&mut inner, &self.name);
                }
            }
            // A call that was already in flight when the breaker opened.
            CircuitState::Open => {
                inner.failures.push_back(Instant::now());
            }
        }
    }
}

fn open(inner: &mut BreakerInner, name: &str) {
    inner.state = CircuitState::Open;
    inner.opened_at = Some(Instant::now());
    inner.failures.clear();
    inner.success_count = 0;
    metrics::counter!("arb_breaker_transitions_total", 1, "breaker" => name.to_string(), "to" => "open");
}

fn prune_failures(failures: &mut VecDeque<Instant>, window: Duration) {
    while let Some(front) = failures.front() {
        if front.elapsed() > window {
            failures.pop_front();
        } else {
            break;
        }
    }
}

/// Registry of named breakers, one per external dependency
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create an empty registry; breakers share `config`
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Fetch the named breaker, creating it closed on first use
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    /// Reset every registered breaker to closed
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        info!(count = self.breakers.len(), "all breakers reset");
    }

    /// Status of one breaker, if registered
    pub fn status_of(&self, name: &str) -> Option<BreakerStatus> {
        self.breakers.get(name).map(|b| b.status())
    }

    /// Statuses of all registered breakers
    pub fn all_statuses(&self) -> Vec<BreakerStatus> {
        self.breakers.iter().map(|e| e.value().status()).collect()
    }

    /// Aggregate health across all registered breakers
    pub fn health_summary(&self) -> HealthSummary {
        let mut open = 0;
        let mut half_open = 0;
        let mut closed = 0;
        for entry in self.breakers.iter() {
            match entry.value().state() {
                CircuitState::Open => open += 1,
                CircuitState::HalfOpen => half_open += 1,
                CircuitState::Closed => closed += 1,
            }
        }
        HealthSummary {
            total: self.breakers.len(),
            open,
            half_open,
            closed,
            healthy: open == 0,
        }
    }
}
