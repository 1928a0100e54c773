//! Bounded exponential-backoff retry around a single fetch call
//!
//! The wait before retry `n` (1-based attempt that just failed) is
//! `initial_interval * backoff_rate^(n-1)`. The deployed policy
//! (5 attempts, 10s, rate 2) therefore waits 10s, 20s, 40s and 80s
//! before giving up: 150s of backoff in total. Every wait is capped at
//! `max_interval` (one hour unless configured).

use crate::config::{RetryOn, WorkflowConfig};
use crate::core::cancel::{CancelReason, Interrupt};
use crate::domain::{Classify, ExportError, Result};
use crate::log_retry_attempt;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Longest single wait unless the configuration sets one
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Retry schedule for one fetch call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    backoff_rate: f64,
    max_interval: Duration,
    retry_on: RetryOn,
}

/// Attempt bookkeeping for one call; discarded once the call settles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far, including the one that settled the call
    pub attempt: u32,
    /// Total time spent waiting between attempts
    pub elapsed_backoff: Duration,
}

/// Why a call under retry did not produce a value
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt failed
    Exhausted {
        /// Final bookkeeping
        state: RetryState,
        /// Error returned by the last attempt
        last_error: E,
    },
    /// The error was not retryable under the policy
    Rejected {
        /// Final bookkeeping
        state: RetryState,
        /// The non-retryable error
        error: E,
    },
    /// The interrupt fired during a call or a backoff wait
    Cancelled {
        /// Final bookkeeping
        state: RetryState,
        /// Shutdown or deadline
        reason: CancelReason,
    },
}

impl<E> RetryError<E> {
    /// Bookkeeping at the moment the call gave up
    pub fn state(&self) -> RetryState {
        match self {
            RetryError::Exhausted { state, .. }
            | RetryError::Rejected { state, .. }
            | RetryError::Cancelled { state, .. } => *state,
        }
    }

    /// The underlying error, if the call failed rather than being cancelled
    pub fn error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::Rejected { error, .. } => Some(error),
            RetryError::Cancelled { .. } => None,
        }
    }
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted { state, last_error } => write!(
                f,
                "retries exhausted after {} attempts: {}",
                state.attempt, last_error
            ),
            RetryError::Rejected { state, error } => write!(
                f,
                "non-retryable error on attempt {}: {}",
                state.attempt, error
            ),
            RetryError::Cancelled { state, reason } => {
                write!(f, "{} during attempt {}", reason, state.attempt)
            }
        }
    }
}

impl<E: std::fmt::Debug + Display> std::error::Error for RetryError<E> {}

impl RetryPolicy {
    /// Creates a validated policy
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_attempts` is 0,
    /// `initial_interval` is zero or `backoff_rate` is not greater than 1.
    pub fn new(
        max_attempts: u32,
        initial_interval: Duration,
        backoff_rate: f64,
        retry_on: RetryOn,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(ExportError::Configuration(
                "retry max_attempts must be >= 1".to_string(),
            ));
        }
        if initial_interval.is_zero() {
            return Err(ExportError::Configuration(
                "retry initial_interval must be > 0".to_string(),
            ));
        }
        if !(backoff_rate > 1.0) || !backoff_rate.is_finite() {
            return Err(ExportError::Configuration(format!(
                "retry backoff_rate must be > 1, got {backoff_rate}"
            )));
        }

        Ok(Self {
            max_attempts,
            initial_interval,
            backoff_rate,
            max_interval: DEFAULT_MAX_INTERVAL.max(initial_interval),
            retry_on,
        })
    }

    /// Caps every wait at `max_interval`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_interval` is shorter than the
    /// initial interval.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Result<Self> {
        if max_interval < self.initial_interval {
            return Err(ExportError::Configuration(format!(
                "retry max_interval ({}ms) must be >= initial_interval ({}ms)",
                max_interval.as_millis(),
                self.initial_interval.as_millis()
            )));
        }
        self.max_interval = max_interval;
        Ok(self)
    }

    /// The policy the workflow has always run with
    pub fn deployed() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_secs(10),
            backoff_rate: 2.0,
            max_interval: DEFAULT_MAX_INTERVAL,
            retry_on: RetryOn::All,
        }
    }

    /// Builds the policy from the `[workflow]` section
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_interval_ms),
            config.backoff_rate,
            config.retry_on,
        )?
        .with_max_interval(Duration::from_millis(config.max_interval_ms))
    }

    /// Total attempts allowed, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Which errors are retried
    pub fn retry_on(&self) -> RetryOn {
        self.retry_on
    }

    /// Wait after `attempt` (1-based) failed, never above `max_interval`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.backoff_rate.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }

    /// Sum of every wait when all attempts fail
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).fold(Duration::ZERO, |total, a| {
            total.saturating_add(self.delay_for(a))
        })
    }

    fn should_retry<E: Classify>(&self, error: &E) -> bool {
        match self.retry_on {
            RetryOn::All => true,
            RetryOn::Transient => error.is_transient(),
        }
    }

    /// Runs `operation` until it succeeds, the attempts run out, a
    /// non-retryable error occurs or `interrupt` fires
    ///
    /// `operation` receives the 1-based attempt number. On success the
    /// value is returned together with the final [`RetryState`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        interrupt: &mut Interrupt,
        mut operation: F,
    ) -> std::result::Result<(T, RetryState), RetryError<E>>
    where
        E: Classify + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut state = RetryState::default();

        loop {
            if let Some(reason) = interrupt.check() {
                return Err(RetryError::Cancelled { state, reason });
            }

            state.attempt += 1;

            let outcome = tokio::select! {
                biased;
                reason = interrupt.wait() => {
                    return Err(RetryError::Cancelled { state, reason });
                }
                outcome = operation(state.attempt) => outcome,
            };

            let error = match outcome {
                Ok(value) => return Ok((value, state)),
                Err(error) => error,
            };

            if !self.should_retry(&error) {
                tracing::warn!(
                    attempt = state.attempt,
                    error = %error,
                    class = ?error.class(),
                    "Fetch failed with a non-retryable error"
                );
                return Err(RetryError::Rejected { state, error });
            }

            if state.attempt >= self.max_attempts {
                tracing::error!(
                    attempt = state.attempt,
                    max_attempts = self.max_attempts,
                    error = %error,
                    "Fetch retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    state,
                    last_error: error,
                });
            }

            let delay = self.delay_for(state.attempt);
            log_retry_attempt!(
                state.attempt,
                self.max_attempts,
                delay.as_millis() as u64,
                error
            );

            tokio::select! {
                biased;
                reason = interrupt.wait() => {
                    return Err(RetryError::Cancelled { state, reason });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            state.elapsed_backoff = state.elapsed_backoff.saturating_add(delay);
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::deployed()
    }
}
