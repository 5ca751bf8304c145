//! Named-command execution with a bulkhead, a deadline and a circuit breaker.
//!
//! # Call Path
//! ```text
//! execute(command, fut)
//!     → circuit breaker   (Open → CircuitOpen)
//!     → bulkhead permit   (full → MaxConcurrency)
//!     → tokio timeout     (elapsed → Timeout, future dropped)
//!     → outcome recorded on the breaker
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::ResilienceConfig;
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState};

/// Why a command did not produce a value.
#[derive(Debug, Error)]
pub enum ExecutionError<E> {
    /// The call exceeded its deadline.
    #[error("command timed out")]
    Timeout,

    /// The bulkhead was full.
    #[error("max concurrency reached")]
    MaxConcurrency,

    /// The circuit is open.
    #[error("circuit open")]
    CircuitOpen,

    /// The command ran and reported an error.
    #[error("command failed: {0}")]
    Command(E),
}

/// Capability to run a fallible future under resilience controls.
pub trait ResilienceExecutor: Send + Sync + 'static {
    fn execute<T, E, Fut>(
        &self,
        command: &str,
        fut: Fut,
    ) -> impl Future<Output = Result<T, ExecutionError<E>>> + Send
    where
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send;
}

/// Limits applied to one command.
#[derive(Debug, Clone)]
pub struct CommandSettings {
    pub timeout: Duration,
    pub max_concurrent_requests: usize,
    pub breaker: BreakerSettings,
}

impl From<&ResilienceConfig> for CommandSettings {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_concurrent_requests: config.max_concurrent_requests,
            breaker: BreakerSettings::from(config),
        }
    }
}

#[derive(Debug)]
struct Command {
    timeout: Duration,
    bulkhead: Arc<Semaphore>,
    breaker: CircuitBreaker,
}

impl Command {
    fn new(name: &str, settings: &CommandSettings) -> Self {
        Self {
            timeout: settings.timeout,
            bulkhead: Arc::new(Semaphore::new(settings.max_concurrent_requests)),
            breaker: CircuitBreaker::new(name, settings.breaker.clone()),
        }
    }
}

/// In-process executor keeping per-command state.
///
/// Commands not configured explicitly are created on first use with the
/// default settings.
#[derive(Debug)]
pub struct CommandExecutor {
    defaults: CommandSettings,
    commands: DashMap<String, Arc<Command>>,
}

impl CommandExecutor {
    pub fn new(defaults: CommandSettings) -> Self {
        Self {
            defaults,
            commands: DashMap::new(),
        }
    }

    /// Set limits for `name`, replacing any existing state.
    pub fn configure(&self, name: &str, settings: &CommandSettings) {
        tracing::debug!(
            command = name,
            timeout_ms = settings.timeout.as_millis() as u64,
            max_concurrent_requests = settings.max_concurrent_requests,
            "Configuring command"
        );
        self.commands
            .insert(name.to_string(), Arc::new(Command::new(name, settings)));
    }

    /// Circuit state of `name`, if it has been used or configured.
    pub fn circuit_state(&self, name: &str) -> Option<CircuitState> {
        self.commands.get(name).map(|c| c.breaker.state())
    }

    fn command(&self, name: &str) -> Arc<Command> {
        if let Some(command) = self.commands.get(name) {
            return command.clone();
        }
        self.commands
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Command::new(name, &self.defaults)))
            .clone()
    }
}

impl ResilienceExecutor for CommandExecutor {
    fn execute<T, E, Fut>(
        &self,
        name: &str,
        fut: Fut,
    ) -> impl Future<Output = Result<T, ExecutionError<E>>> + Send
    where
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send,
    {
        let command = self.command(name);
        let name = name.to_string();
        async move {
            let Some(attempt) = Attempt::start(&command.breaker) else {
                tracing::debug!(command = %name, "Circuit open, rejecting call");
                return Err(ExecutionError::CircuitOpen);
            };

            let Ok(permit) = command.bulkhead.clone().try_acquire_owned() else {
                tracing::debug!(command = %name, "Bulkhead full, rejecting call");
                return Err(ExecutionError::MaxConcurrency);
            };

            let outcome = tokio::time::timeout(command.timeout, fut).await;
            drop(permit);

            match outcome {
                Ok(Ok(value)) => {
                    attempt.succeeded();
                    Ok(value)
                }
                Ok(Err(e)) => {
                    attempt.failed();
                    Err(ExecutionError::Command(e))
                }
                Err(_) => {
                    attempt.failed();
                    tracing::warn!(
                        command = %name,
                        timeout_ms = command.timeout.as_millis() as u64,
                        "Command timed out"
                    );
                    Err(ExecutionError::Timeout)
                }
            }
        }
    }
}

/// A call admitted by the breaker.
///
/// Dropped without an outcome (bulkhead rejection, caller gone), it
/// releases its slot back to the breaker.
struct Attempt<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl<'a> Attempt<'a> {
    fn start(breaker: &'a CircuitBreaker) -> Option<Self> {
        breaker.try_acquire().then_some(Self {
            breaker,
            settled: false,
        })
    }

    fn succeeded(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn failed(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> CommandSettings {
        CommandSettings {
            timeout: Duration::from_millis(100),
            max_concurrent_requests: 2,
            breaker: BreakerSettings {
                request_volume_threshold: 3,
                error_percent_threshold: 50,
                sleep_window: Duration::from_secs(5),
                rolling_window: Duration::from_secs(10),
                rolling_window_buckets: 10,
                half_open_max_calls: 1,
            },
        }
    }

    async fn ok() -> Result<u32, &'static str> {
        Ok(7)
    }

    async fn boom() -> Result<u32, &'static str> {
        Err("boom")
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let executor = CommandExecutor::new(settings());
        let value = executor.execute("proxy", ok()).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(executor.circuit_state("proxy"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_command_error_is_wrapped() {
        let executor = CommandExecutor::new(settings());
        let err = executor.execute("proxy", boom()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Command("boom")));
    }

    #[tokio::test]
    async fn test_timeout() {
        tokio::time::pause();
        let executor = CommandExecutor::new(settings());
        let slow = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, &'static str>(1)
        };
        let err = executor.execute("proxy", slow).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout));
    }

    #[tokio::test]
    async fn test_bulkhead_rejects_overflow() {
        let executor = Arc::new(CommandExecutor::new(settings()));
        let (release_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let started = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let executor = executor.clone();
            let mut release = release_tx.subscribe();
            let started = started.clone();
            handles.push(tokio::spawn(async move {
                executor
                    .execute("proxy", async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        let _ = release.recv().await;
                        Ok::<_, &'static str>(())
                    })
                    .await
            }));
        }
        while started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        let err = executor.execute("proxy", ok()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::MaxConcurrency));

        release_tx.send(()).unwrap();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert!(executor.execute("proxy", ok()).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_circuit_skips_command() {
        tokio::time::pause();
        let executor = CommandExecutor::new(settings());
        for _ in 0..3 {
            let _ = executor.execute("proxy", boom()).await;
        }
        assert_eq!(executor.circuit_state("proxy"), Some(CircuitState::Open));

        let calls = AtomicUsize::new(0);
        let err = executor
            .execute("proxy", async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::CircuitOpen));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(executor.execute("proxy", ok()).await.is_ok());
        assert_eq!(executor.circuit_state("proxy"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_abandoned_trial_call_frees_half_open_slot() {
        tokio::time::pause();
        let executor = CommandExecutor::new(settings());
        for _ in 0..3 {
            let _ = executor.execute("proxy", boom()).await;
        }
        tokio::time::advance(Duration::from_secs(5)).await;

        // The caller gives up on the trial before it finishes.
        let trial = executor.execute("proxy", async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, &'static str>(())
        });
        assert!(tokio::time::timeout(Duration::from_millis(10), trial).await.is_err());
        assert_eq!(executor.circuit_state("proxy"), Some(CircuitState::HalfOpen));

        assert!(executor.execute("proxy", ok()).await.is_ok());
        assert_eq!(executor.circuit_state("proxy"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_commands_are_isolated() {
        let executor = CommandExecutor::new(settings());
        for _ in 0..3 {
            let _ = executor.execute("a", boom()).await;
        }
        assert_eq!(executor.circuit_state("a"), Some(CircuitState::Open));
        assert!(executor.execute("b", ok()).await.is_ok());
        assert_eq!(executor.circuit_state("c"), None);
    }

    #[tokio::test]
    async fn test_configure_overrides_defaults() {
        tokio::time::pause();
        let executor = CommandExecutor::new(settings());
        let mut tight = settings();
        tight.timeout = Duration::from_millis(10);
        executor.configure("tight", &tight);

        let slow = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, &'static str>(())
        };
        assert!(matches!(
            executor.execute("tight", slow()).await,
            Err(ExecutionError::Timeout)
        ));
        assert!(executor.execute("proxy", slow()).await.is_ok());
    }
}
