//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through and are counted
//! - Open: upstream assumed unhealthy, calls fail fast
//! - Half-Open: a bounded number of trial calls test the upstream
//!
//! # State Transitions
//! ```text
//! Closed → Open: volume >= request_volume_threshold
//!                and error% >= error_percent_threshold within the window
//! Open → Half-Open: after sleep_window
//! Half-Open → Closed: a trial call succeeds
//! Half-Open → Open: a trial call fails
//! ```

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ResilienceConfig;
use crate::resilience::window::{HealthCounts, RollingWindow};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Thresholds driving the state machine.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub request_volume_threshold: u64,
    pub error_percent_threshold: u8,
    pub sleep_window: Duration,
    pub rolling_window: Duration,
    pub rolling_window_buckets: u32,
    pub half_open_max_calls: u32,
}

impl From<&ResilienceConfig> for BreakerSettings {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            request_volume_threshold: config.request_volume_threshold,
            error_percent_threshold: config.error_percent_threshold,
            sleep_window: config.sleep_window(),
            rolling_window: config.rolling_window(),
            rolling_window_buckets: config.rolling_window_buckets,
            half_open_max_calls: config.half_open_max_calls,
        }
    }
}

#[derive(Debug)]
enum State {
    Closed,
    Open { since: Instant },
    HalfOpen { in_flight: u32 },
}

#[derive(Debug)]
struct Inner {
    state: State,
    window: RollingWindow,
}

/// Three-state circuit breaker for one command.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let window = RollingWindow::new(settings.rolling_window, settings.rolling_window_buckets);
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(Inner {
                state: State::Closed,
                window,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.lock().state {
            State::Closed => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Counts in the current rolling window.
    pub fn health(&self) -> HealthCounts {
        self.lock().window.counts()
    }

    /// Ask to start a call. `false` means short-circuit.
    ///
    /// Every `true` must be followed by exactly one of
    /// [`record_success`](Self::record_success),
    /// [`record_failure`](Self::record_failure) or
    /// [`release`](Self::release).
    pub fn try_acquire(&self) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed => true,
            State::Open { since } => {
                if since.elapsed() >= self.settings.sleep_window {
                    tracing::info!(command = %self.name, "Circuit half-open, allowing trial call");
                    inner.state = State::HalfOpen { in_flight: 1 };
                    true
                } else {
                    false
                }
            }
            State::HalfOpen { ref mut in_flight } => {
                if *in_flight < self.settings.half_open_max_calls {
                    *in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed => inner.window.record_success(),
            State::HalfOpen { .. } => {
                tracing::info!(command = %self.name, "Circuit closed, upstream recovered");
                inner.state = State::Closed;
                inner.window.reset();
            }
            // Started before the circuit opened.
            State::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            State::Closed => {
                inner.window.record_failure();
                let counts = inner.window.counts();
                if counts.total() >= self.settings.request_volume_threshold
                    && counts.error_percent() >= u64::from(self.settings.error_percent_threshold)
                {
                    tracing::warn!(
                        command = %self.name,
                        requests = counts.total(),
                        error_percent = counts.error_percent(),
                        "Circuit opened"
                    );
                    inner.state = State::Open { since: Instant::now() };
                }
            }
            State::HalfOpen { .. } => {
                tracing::warn!(command = %self.name, "Trial call failed, circuit re-opened");
                inner.state = State::Open { since: Instant::now() };
            }
            State::Open { .. } => {}
        }
    }

    /// Give back an acquired slot without an outcome (the call never ran).
    pub fn release(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let State::HalfOpen { ref mut in_flight } = inner.state {
            *in_flight = in_flight.saturating_sub(1);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // State stays consistent even if a holder panicked mid-update.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BreakerSettings {
        BreakerSettings {
            request_volume_threshold: 4,
            error_percent_threshold: 50,
            sleep_window: Duration::from_secs(5),
            rolling_window: Duration::from_secs(10),
            rolling_window_buckets: 10,
            half_open_max_calls: 1,
        }
    }

    fn fail(breaker: &CircuitBreaker, n: usize) {
        for _ in 0..n {
            assert!(breaker.try_acquire());
            breaker.record_failure();
        }
    }

    #[tokio::test]
    async fn test_stays_closed_below_volume() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new("proxy", settings());
        fail(&breaker, 3);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().failures, 3);
    }

    #[tokio::test]
    async fn test_stays_closed_below_error_rate() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new("proxy", settings());
        for _ in 0..4 {
            assert!(breaker.try_acquire());
            breaker.record_success();
        }
        fail(&breaker, 3);
        // 3 of 7 failed: 42%.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_and_short_circuits() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new("proxy", settings());
        fail(&breaker, 4);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire());
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new("proxy", settings());
        fail(&breaker, 4);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!breaker.try_acquire());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        // Only one trial at a time.
        assert!(!breaker.try_acquire());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health().total(), 0);
        assert!(breaker.try_acquire());
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new("proxy", settings());
        fail(&breaker, 4);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.try_acquire());
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // The cool-down restarts from the failed trial.
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!breaker.try_acquire());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(breaker.try_acquire());
    }

    #[tokio::test]
    async fn test_release_frees_trial_slot() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new("proxy", settings());
        fail(&breaker, 4);
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(breaker.try_acquire());
        breaker.release();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire());
    }

    #[tokio::test]
    async fn test_failures_age_out_of_window() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new("proxy", settings());
        fail(&breaker, 3);
        tokio::time::advance(Duration::from_secs(11)).await;
        fail(&breaker, 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
