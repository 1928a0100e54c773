//! Cancellation signals for a running execution
//!
//! An [`Interrupt`] combines the process shutdown signal with an optional
//! wall-clock deadline. Long waits (backoff sleeps, in-flight fetches) race
//! against [`Interrupt::wait`] so either source preempts them.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

/// Why an execution was stopped before reaching a natural terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Shutdown was requested (Ctrl+C, SIGTERM)
    Aborted,
    /// The execution deadline passed
    TimedOut,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Aborted => write!(f, "execution aborted"),
            CancelReason::TimedOut => write!(f, "execution timed out"),
        }
    }
}

/// Shutdown signal plus optional deadline
#[derive(Debug, Clone)]
pub struct Interrupt {
    shutdown: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// Creates an interrupt driven only by the shutdown signal
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown,
            deadline: None,
        }
    }

    /// Adds a deadline; passing it cancels with [`CancelReason::TimedOut`]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Interrupt that never fires, for callers without a shutdown source
    pub fn never() -> Self {
        // A closed channel never reports shutdown
        let (_tx, rx) = watch::channel(false);
        Self::new(rx)
    }

    /// Returns the deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check; shutdown wins over an expired deadline
    pub fn check(&self) -> Option<CancelReason> {
        if *self.shutdown.borrow() {
            return Some(CancelReason::Aborted);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::TimedOut),
            _ => None,
        }
    }

    /// Resolves once the execution must stop
    ///
    /// A dropped shutdown sender is treated as "never shut down" so only the
    /// deadline can fire afterwards.
    pub async fn wait(&mut self) -> CancelReason {
        let Self { shutdown, deadline } = self;
        let deadline = *deadline;

        let shutdown_requested = async {
            loop {
                if *shutdown.borrow_and_update() {
                    return;
                }
                if shutdown.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        let deadline_passed = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = shutdown_requested => CancelReason::Aborted,
            _ = deadline_passed => CancelReason::TimedOut,
        }
    }
}
