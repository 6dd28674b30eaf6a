//! Per-provider circuit breaker.
//!
//! After `threshold` consecutive failed fetches a provider is skipped until
//! `cooldown` has elapsed; the next attempt after that either closes the
//! circuit again or reopens it. State lives in memory only.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            opened_at: None,
        }
    }
}

pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether a fetch of `provider` may be attempted now.
    pub fn is_allowed(&self, provider: &str) -> bool {
        let mut circuits = self.lock();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = circuit
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.cooldown);
                if cooled_down {
                    info!(provider, "Circuit half-open, allowing a trial fetch");
                    circuit.state = CircuitState::HalfOpen;
                }
                cooled_down
            }
        }
    }

    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);
        if circuit.state != CircuitState::Closed {
            info!(provider, "Circuit closed");
        }
        *circuit = Circuit::new();
    }

    pub fn record_failure(&self, provider: &str) {
        let mut circuits = self.lock();
        let circuit = circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new);
        circuit.failures += 1;
        debug!(provider, failures = circuit.failures, "Circuit recorded failure");

        if circuit.state == CircuitState::HalfOpen || circuit.failures >= self.threshold {
            if circuit.state != CircuitState::Open {
                warn!(
                    provider,
                    failures = circuit.failures,
                    "Circuit opened, skipping provider for {:?}",
                    self.cooldown
                );
            }
            circuit.state = CircuitState::Open;
            circuit.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, provider: &str) -> CircuitState {
        self.lock()
            .get(provider)
            .map_or(CircuitState::Closed, |c| c.state)
    }
}
