//! Export execution record and its state machine
//!
//! ```text
//! Start -> Fetching -> Continue -> Fetching -> ... -> Succeeded
//!                  \-> Failed
//! ```
//!
//! Timed out and aborted executions end in `Failed` with the matching
//! [`TerminalOutcome`].

use crate::core::cancel::CancelReason;
use crate::domain::{Cursor, ExecutionId, ExportError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an execution in the pagination loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created, no call made yet
    Start,
    /// A fetch call is in flight
    Fetching,
    /// The last call returned a cursor; another call follows
    Continue,
    /// The last call returned no cursor
    Succeeded,
    /// Retries exhausted, counter update failed, or cancelled
    Failed,
}

impl ExecutionState {
    /// True for `Succeeded` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Succeeded | ExecutionState::Failed)
    }
}

/// How an execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Aborted,
}

impl TerminalOutcome {
    /// True only for [`TerminalOutcome::Succeeded`]
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalOutcome::Succeeded)
    }

    /// Status string used in events and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalOutcome::Succeeded => "SUCCEEDED",
            TerminalOutcome::Failed => "FAILED",
            TerminalOutcome::TimedOut => "TIMED_OUT",
            TerminalOutcome::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for TerminalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CancelReason> for TerminalOutcome {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Aborted => TerminalOutcome::Aborted,
            CancelReason::TimedOut => TerminalOutcome::TimedOut,
        }
    }
}

/// One run of the export workflow
///
/// Owned by the driver and mutated only by the pagination loop. The
/// terminal outcome is set once and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportExecution {
    /// Unique identifier
    pub id: ExecutionId,

    /// Current state
    pub state: ExecutionState,

    /// Cursor for the next call; `None` before the first call or when done
    pub cursor: Option<Cursor>,

    /// Items exported by this execution
    pub items_exported: u64,

    /// Counter value after the last successful update
    pub counter_value: Option<u64>,

    /// Completed fetch calls
    pub pages_fetched: u32,

    /// When the execution started
    pub started_at: DateTime<Utc>,

    /// When the execution reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,

    /// Terminal outcome
    pub outcome: Option<TerminalOutcome>,

    /// Operator-facing failure cause
    pub cause: Option<String>,

    /// Captured error text of the failure
    pub error: Option<String>,
}

impl ExportExecution {
    /// Creates an execution in `Start`, optionally seeded with a cursor
    pub fn new(id: ExecutionId, starting_cursor: Option<Cursor>) -> Self {
        Self {
            id,
            state: ExecutionState::Start,
            cursor: starting_cursor,
            items_exported: 0,
            counter_value: None,
            pages_fetched: 0,
            started_at: Utc::now(),
            ended_at: None,
            outcome: None,
            cause: None,
            error: None,
        }
    }

    /// Enters `Fetching`
    ///
    /// # Errors
    ///
    /// Returns a validation error if the execution is already terminal.
    pub fn begin_fetch(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.state = ExecutionState::Fetching;
        Ok(())
    }

    /// Records a completed call and the counter value written for it
    ///
    /// Moves to `Continue` when `next_cursor` is present, `Succeeded`
    /// otherwise.
    pub fn record_page(
        &mut self,
        items: u64,
        next_cursor: Option<Cursor>,
        counter_value: u64,
    ) -> Result<()> {
        if self.state != ExecutionState::Fetching {
            return Err(ExportError::Validation(format!(
                "execution {} recorded a page while {:?}",
                self.id, self.state
            )));
        }

        self.items_exported += items;
        self.pages_fetched += 1;
        self.counter_value = Some(counter_value);

        match next_cursor {
            Some(cursor) => {
                self.cursor = Some(cursor);
                self.state = ExecutionState::Continue;
                Ok(())
            }
            None => {
                self.cursor = None;
                self.finish(TerminalOutcome::Succeeded, None, None)
            }
        }
    }

    /// Attaches the terminal outcome
    ///
    /// # Errors
    ///
    /// Returns a validation error if an outcome is already attached.
    pub fn finish(
        &mut self,
        outcome: TerminalOutcome,
        cause: Option<String>,
        error: Option<String>,
    ) -> Result<()> {
        self.ensure_running()?;

        self.state = if outcome.is_success() {
            ExecutionState::Succeeded
        } else {
            ExecutionState::Failed
        };
        self.outcome = Some(outcome);
        self.cause = cause;
        self.error = error;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Time between start and end (or now, if still running)
    pub fn duration(&self) -> std::time::Duration {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    fn ensure_running(&self) -> Result<()> {
        if let Some(outcome) = self.outcome {
            return Err(ExportError::Validation(format!(
                "execution {} already finished with {}",
                self.id, outcome
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(token: &str) -> Option<Cursor> {
        Some(Cursor::new(token).unwrap())
    }

    #[test]
    fn test_new_execution_starts_without_outcome() {
        let execution = ExportExecution::new(ExecutionId::new(), None);
        assert_eq!(execution.state, ExecutionState::Start);
        assert!(execution.outcome.is_none());
        assert!(execution.ended_at.is_none());
        assert_eq!(execution.items_exported, 0);
    }

    #[test]
    fn test_pages_continue_until_cursor_absent() {
        let mut execution = ExportExecution::new(ExecutionId::new(), None);

        execution.begin_fetch().unwrap();
        execution.record_page(10, cursor("A"), 10).unwrap();
        assert_eq!(execution.state, ExecutionState::Continue);
        assert_eq!(execution.cursor.as_ref().map(Cursor::as_str), Some("A"));

        execution.begin_fetch().unwrap();
        execution.record_page(5, None, 15).unwrap();
        assert_eq!(execution.state, ExecutionState::Succeeded);
        assert_eq!(execution.outcome, Some(TerminalOutcome::Succeeded));
        assert_eq!(execution.items_exported, 15);
        assert_eq!(execution.pages_fetched, 2);
        assert_eq!(execution.counter_value, Some(15));
        assert!(execution.ended_at.is_some());
    }

    #[test]
    fn test_outcome_is_immutable() {
        let mut execution = ExportExecution::new(ExecutionId::new(), None);
        execution
            .finish(
                TerminalOutcome::Failed,
                Some("Security Hub Export Failed.".into()),
                Some("boom".into()),
            )
            .unwrap();

        assert!(execution
            .finish(TerminalOutcome::Succeeded, None, None)
            .is_err());
        assert!(execution.begin_fetch().is_err());
        assert_eq!(execution.outcome, Some(TerminalOutcome::Failed));
        assert_eq!(execution.state, ExecutionState::Failed);
    }

    #[test]
    fn test_record_page_requires_fetching() {
        let mut execution = ExportExecution::new(ExecutionId::new(), None);
        assert!(execution.record_page(1, None, 1).is_err());
    }

    #[test]
    fn test_cancel_reason_maps_to_outcome() {
        assert_eq!(
            TerminalOutcome::from(CancelReason::Aborted),
            TerminalOutcome::Aborted
        );
        assert_eq!(
            TerminalOutcome::from(CancelReason::TimedOut),
            TerminalOutcome::TimedOut
        );
    }

    #[test]
    fn test_outcome_serializes_as_status_string() {
        assert_eq!(
            serde_json::to_string(&TerminalOutcome::TimedOut).unwrap(),
            "\"TIMED_OUT\""
        );
        assert_eq!(TerminalOutcome::Aborted.to_string(), "ABORTED");
        assert!(!ExecutionState::Continue.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
    }
}
