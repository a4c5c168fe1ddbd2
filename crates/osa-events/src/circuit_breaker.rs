//! Circuit breaker protecting calls to unreliable dependencies.
//!
//! Fails fast once a dependency has accumulated enough recent failures,
//! instead of queuing retries against a dead service. All timing is
//! evaluated lazily on call attempts; an open circuit imposes zero idle
//! cost. The breaker's timeout is a state-transition timer, not a per-call
//! timeout: bounding individual calls is the wrapped operation's job.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls proceed.
    #[default]
    Closed,
    /// Circuit tripped, calls rejected immediately.
    Open,
    /// Probation, calls allowed while recovery is assessed.
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Live failures within the monitoring period before opening.
    pub failure_threshold: u32,
    /// How long to stay open before allowing a probe call.
    pub timeout_duration: StdDuration,
    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,
    /// Sliding-window length for failure counting.
    pub monitoring_period: StdDuration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_duration: StdDuration::from_secs(60),
            success_threshold: 3,
            monitoring_period: StdDuration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_timeout_duration(mut self, timeout: StdDuration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_monitoring_period(mut self, period: StdDuration) -> Self {
        self.monitoring_period = period;
        self
    }

    fn window(&self) -> Duration {
        Duration::milliseconds(self.monitoring_period.as_millis() as i64)
    }

    fn cooldown(&self) -> Duration {
        Duration::milliseconds(self.timeout_duration.as_millis() as i64)
    }
}

/// Error returned by [`CircuitBreaker::execute`].
///
/// Distinguishes "the call itself failed" from "we didn't even try because
/// the circuit is open", so callers can choose not to retry immediately.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    Open {
        name: String,
        next_attempt: DateTime<Utc>,
    },
    /// The operation ran and failed.
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Whether this is the fail-fast rejection.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Seconds until the next allowed attempt, for `Retry-After` hints.
    /// `None` unless the circuit is open.
    pub fn retry_after_secs(&self) -> Option<i64> {
        match self {
            Self::Open { next_attempt, .. } => {
                Some((*next_attempt - Utc::now()).num_seconds().max(0))
            }
            Self::Operation(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { name, next_attempt } => write!(
                f,
                "circuit breaker '{name}' is open, next attempt at {next_attempt}"
            ),
            Self::Operation(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for BreakerError<E> {}

/// Read-only snapshot of one breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    /// Failures still inside the sliding window.
    pub failure_count: u32,
    pub success_count_in_half_open: u32,
    pub next_attempt_time: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct BreakerInner {
    state: CircuitState,
    /// Sliding window of failure timestamps, pruned to the monitoring
    /// period on each evaluation.
    failures: Vec<DateTime<Utc>>,
    success_count_in_half_open: u32,
    next_attempt: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
}

impl BreakerInner {
    fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        let cutoff = now - window;
        self.failures.retain(|t| *t > cutoff);
    }
}

/// In-memory health tracker for one named dependency.
///
/// Lives for the process lifetime; all state transitions happen lazily
/// inside call attempts.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in the closed state.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run an operation through the breaker; every operation error counts
    /// as a failure.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_classified(op, |_| true).await
    }

    /// Run an operation with a caller-supplied failure classifier.
    ///
    /// Errors for which `is_failure` returns false pass through to the
    /// caller unchanged and leave breaker state alone (a downstream 4xx is
    /// the caller's bug, not a health signal).
    pub async fn execute_classified<T, E, F, Fut, P>(
        &self,
        op: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        if let Some(next_attempt) = self.before_call(Utc::now()).await {
            return Err(BreakerError::Open {
                name: self.name.clone(),
                next_attempt,
            });
        }

        match op().await {
            Ok(value) => {
                self.on_success(Utc::now()).await;
                Ok(value)
            }
            Err(e) => {
                if is_failure(&e) {
                    self.on_failure(Utc::now()).await;
                }
                Err(BreakerError::Operation(e))
            }
        }
    }

    /// Snapshot of the current state. Read-only apart from the idempotent
    /// window pruning it performs.
    pub async fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.inner.lock().await;
        inner.prune(Utc::now(), self.config.window());
        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failures.len() as u32,
            success_count_in_half_open: inner.success_count_in_half_open,
            next_attempt_time: inner.next_attempt,
            last_failure_at: inner.last_failure_at,
            last_success_at: inner.last_success_at,
        }
    }

    /// Current state without any side effects beyond the lazy open-to-half-
    /// open advancement performed by call attempts.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Force the breaker back to closed with cleared history.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        *inner = BreakerInner::default();
        tracing::info!(
            target: "circuit_breaker",
            name = %self.name,
            "Circuit breaker reset"
        );
    }

    /// Gate a call attempt. Returns the next-attempt time when the call is
    /// rejected, or `None` when it may proceed.
    async fn before_call(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => None,
            CircuitState::Open => match inner.next_attempt {
                Some(next_attempt) if now < next_attempt => Some(next_attempt),
                _ => {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count_in_half_open = 0;
                    tracing::info!(
                        target: "circuit_breaker",
                        name = %self.name,
                        "Circuit breaker transitioning to half-open for probe"
                    );
                    None
                }
            },
        }
    }

    async fn on_success(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        inner.last_success_at = Some(now);
        match inner.state {
            CircuitState::Closed => {
                inner.prune(now, self.config.window());
            }
            CircuitState::HalfOpen => {
                inner.success_count_in_half_open += 1;
                if inner.success_count_in_half_open >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures.clear();
                    inner.success_count_in_half_open = 0;
                    inner.next_attempt = None;
                    tracing::info!(
                        target: "circuit_breaker",
                        name = %self.name,
                        "Circuit breaker closed after successful probes"
                    );
                }
            }
            CircuitState::Open => {
                // Call attempts transition open to half-open first, so this
                // only happens on a reset race.
                tracing::warn!(
                    target: "circuit_breaker",
                    name = %self.name,
                    "Success recorded while circuit is open"
                );
            }
        }
    }

    async fn on_failure(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        inner.last_failure_at = Some(now);
        inner.failures.push(now);
        inner.prune(now, self.config.window());

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                // Same sliding-window rule in both states: an isolated
                // half-open failure below threshold stays in probation,
                // a reversion to a true outage reopens.
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    let next_attempt = now + self.config.cooldown();
                    inner.state = CircuitState::Open;
                    inner.next_attempt = Some(next_attempt);
                    inner.success_count_in_half_open = 0;
                    tracing::warn!(
                        target: "circuit_breaker",
                        name = %self.name,
                        failure_count = inner.failures.len(),
                        threshold = self.config.failure_threshold,
                        next_attempt = %next_attempt,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

/// One breaker per dependency name, lazily created with a shared default
/// config.
///
/// Constructed once at process startup and passed by handle into request
/// paths; per-name isolation keeps one failing dependency from starving
/// calls to a healthy one.
#[derive(Clone)]
pub struct CircuitBreakerManager {
    breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    /// Create a manager whose lazily-created breakers use `default_config`.
    #[must_use]
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Arc::new(RwLock::new(HashMap::new())),
            default_config,
        }
    }

    /// Manager with the stock defaults (threshold 5, 60s timeout, 3
    /// half-open successes, 60s window).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Get or lazily create the breaker for a dependency name.
    pub async fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().await;
            if let Some(breaker) = breakers.get(name) {
                return breaker.clone();
            }
        }

        let mut breakers = self.breakers.write().await;
        // Double-check after acquiring the write lock.
        if let Some(breaker) = breakers.get(name) {
            return breaker.clone();
        }
        let breaker = Arc::new(CircuitBreaker::new(name, self.default_config.clone()));
        breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    /// Register a breaker with a non-default config for a name.
    pub async fn breaker_with_config(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config)))
            .clone()
    }

    /// Snapshot every registered breaker.
    pub async fn stats_all(&self) -> Vec<CircuitBreakerStats> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().cloned().collect();
        let mut stats = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            stats.push(breaker.stats().await);
        }
        stats
    }

    /// Reset one breaker; returns false if the name is unknown.
    pub async fn reset(&self, name: &str) -> bool {
        let breaker = {
            let breakers = self.breakers.read().await;
            breakers.get(name).cloned()
        };
        match breaker {
            Some(breaker) => {
                breaker.reset().await;
                true
            }
            None => false,
        }
    }
}
