//! Pagination loop
//!
//! Calls the fetch task through the retry policy, adds each call's item
//! count to the counter, and follows the returned cursor until it runs out.
//! Exactly one call is in flight at a time and counter updates happen in
//! fetch order.

use crate::adapters::fetch::traits::{FetchRequest, FetchTask};
use crate::core::cancel::{CancelReason, Interrupt};
use crate::core::export::execution::{ExportExecution, TerminalOutcome};
use crate::core::retry::{RetryError, RetryPolicy};
use crate::core::state::counter::ProgressCounter;
use crate::domain::{ExportError, Result};
use crate::log_page_exported;
use std::sync::Arc;

/// Drives one execution from `Start` to a terminal state
pub struct PaginationLoop {
    task: Arc<dyn FetchTask>,
    retry: RetryPolicy,
    counter: ProgressCounter,
    failure_cause: String,
}

impl PaginationLoop {
    pub fn new(
        task: Arc<dyn FetchTask>,
        retry: RetryPolicy,
        counter: ProgressCounter,
        failure_cause: impl Into<String>,
    ) -> Self {
        Self {
            task,
            retry,
            counter,
            failure_cause: failure_cause.into(),
        }
    }

    /// Runs until `execution` is terminal
    ///
    /// Fetch failures, counter failures and cancellation all end in a
    /// terminal outcome on `execution`, not in an `Err`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `execution` was already terminal.
    pub async fn run(&self, execution: &mut ExportExecution, interrupt: &mut Interrupt) -> Result<()> {
        loop {
            if let Some(reason) = interrupt.check() {
                return self.cancel(execution, reason);
            }

            execution.begin_fetch()?;
            let request = FetchRequest {
                execution_id: execution.id,
                cursor: execution.cursor.clone(),
            };
            let call = execution.pages_fetched + 1;

            tracing::debug!(
                execution_id = %execution.id,
                call,
                cursor = request.cursor.as_ref().map(|c| c.as_str()).unwrap_or(""),
                "Fetching"
            );

            let task = &self.task;
            let outcome = self
                .retry
                .execute(interrupt, |_attempt| {
                    let request = request.clone();
                    async move { task.fetch(request).await }
                })
                .await;

            let result = match outcome {
                Ok((result, _state)) => result,
                Err(RetryError::Cancelled { reason, .. }) => {
                    return self.cancel(execution, reason);
                }
                Err(err) => {
                    let error = match err.error() {
                        Some(fetch_error) => ExportError::from(fetch_error.clone()).to_string(),
                        None => err.to_string(),
                    };
                    tracing::error!(
                        execution_id = %execution.id,
                        call,
                        attempts = err.state().attempt,
                        error = %err,
                        "Fetch call failed"
                    );
                    return self.fail(execution, error);
                }
            };

            let counter_value = match self.counter.add(result.items_processed).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!(
                        execution_id = %execution.id,
                        call,
                        error = %e,
                        "Counter update failed"
                    );
                    return self.fail(execution, ExportError::from(e).to_string());
                }
            };

            log_page_exported!(
                execution.id,
                call,
                result.items_processed,
                execution.items_exported + result.items_processed,
                result.has_more()
            );

            execution.record_page(result.items_processed, result.next_cursor, counter_value)?;
            if execution.state.is_terminal() {
                return Ok(());
            }
        }
    }

    fn fail(&self, execution: &mut ExportExecution, error: String) -> Result<()> {
        execution.finish(
            TerminalOutcome::Failed,
            Some(self.failure_cause.clone()),
            Some(error),
        )
    }

    fn cancel(&self, execution: &mut ExportExecution, reason: CancelReason) -> Result<()> {
        tracing::warn!(
            execution_id = %execution.id,
            reason = %reason,
            pages_fetched = execution.pages_fetched,
            "Execution cancelled"
        );
        execution.finish(
            TerminalOutcome::from(reason),
            Some(self.failure_cause.clone()),
            Some(reason.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fetch::traits::FetchResult;
    use crate::config::RetryOn;
    use crate::core::export::execution::ExecutionState;
    use crate::core::state::counter::{CounterStore, InMemoryCounterStore};
    use crate::domain::{Cursor, ExecutionId, FetchError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    type Scripted = std::result::Result<FetchResult, FetchError>;

    /// Replays a fixed sequence of call results and records each request
    struct ScriptedTask {
        script: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedTask {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FetchTask for ScriptedTask {
        async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResult, FetchError> {
            self.requests
                .lock()
                .unwrap()
                .push(request.cursor.map(Cursor::into_inner));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Connection("script exhausted".into())))
        }
    }

    fn page(items: u64, next: Option<&str>) -> Scripted {
        Ok(FetchResult {
            items_processed: items,
            next_cursor: next.map(|c| Cursor::new(c).unwrap()),
        })
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(10), 2.0, RetryOn::All).unwrap()
    }

    fn build(task: Arc<ScriptedTask>, store: Arc<InMemoryCounterStore>, retry: RetryPolicy) -> PaginationLoop {
        PaginationLoop::new(
            task,
            retry,
            ProgressCounter::new(store),
            "Security Hub Export Failed.",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_cursor_until_absent() {
        let task = Arc::new(ScriptedTask::new(vec![
            page(10, Some("A")),
            page(5, Some("B")),
            page(3, None),
        ]));
        let store = Arc::new(InMemoryCounterStore::new("/sechubexport/count"));
        let pagination = build(task.clone(), store.clone(), fast_retry(5));

        let mut execution = ExportExecution::new(ExecutionId::new(), None);
        pagination
            .run(&mut execution, &mut Interrupt::never())
            .await
            .unwrap();

        assert_eq!(execution.outcome, Some(TerminalOutcome::Succeeded));
        assert_eq!(execution.items_exported, 18);
        assert_eq!(execution.pages_fetched, 3);
        assert_eq!(store.get().await.unwrap(), 18);
        assert_eq!(
            *task.requests.lock().unwrap(),
            vec![None, Some("A".to_string()), Some("B".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_cursor_is_used() {
        let task = Arc::new(ScriptedTask::new(vec![page(2, None)]));
        let store = Arc::new(InMemoryCounterStore::new("/sechubexport/count"));
        let pagination = build(task.clone(), store, fast_retry(5));

        let mut execution =
            ExportExecution::new(ExecutionId::new(), Some(Cursor::new("resume").unwrap()));
        pagination
            .run(&mut execution, &mut Interrupt::never())
            .await
            .unwrap();

        assert_eq!(
            *task.requests.lock().unwrap(),
            vec![Some("resume".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_without_counter_write() {
        let task = Arc::new(ScriptedTask::new(vec![]));
        let store = Arc::new(InMemoryCounterStore::with_value("/sechubexport/count", 100));
        let pagination = build(task.clone(), store.clone(), fast_retry(5));

        let mut execution = ExportExecution::new(ExecutionId::new(), None);
        pagination
            .run(&mut execution, &mut Interrupt::never())
            .await
            .unwrap();

        assert_eq!(task.calls(), 5);
        assert_eq!(execution.outcome, Some(TerminalOutcome::Failed));
        assert_eq!(execution.state, ExecutionState::Failed);
        assert_eq!(execution.cause.as_deref(), Some("Security Hub Export Failed."));
        assert!(execution
            .error
            .as_deref()
            .unwrap()
            .contains("script exhausted"));
        assert_eq!(store.get().await.unwrap(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_progress_keeps_committed_count() {
        let task = Arc::new(ScriptedTask::new(vec![page(7, Some("A"))]));
        let store = Arc::new(InMemoryCounterStore::new("/sechubexport/count"));
        let pagination = build(task.clone(), store.clone(), fast_retry(2));

        let mut execution = ExportExecution::new(ExecutionId::new(), None);
        pagination
            .run(&mut execution, &mut Interrupt::never())
            .await
            .unwrap();

        assert_eq!(task.calls(), 3);
        assert_eq!(execution.outcome, Some(TerminalOutcome::Failed));
        assert_eq!(execution.items_exported, 7);
        assert_eq!(store.get().await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_items_without_cursor_is_one_call() {
        let task = Arc::new(ScriptedTask::new(vec![page(0, None)]));
        let store = Arc::new(InMemoryCounterStore::with_value("/sechubexport/count", 9));
        let pagination = build(task.clone(), store.clone(), fast_retry(5));

        let mut execution = ExportExecution::new(ExecutionId::new(), None);
        pagination
            .run(&mut execution, &mut Interrupt::never())
            .await
            .unwrap();

        assert_eq!(task.calls(), 1);
        assert_eq!(execution.outcome, Some(TerminalOutcome::Succeeded));
        assert_eq!(store.load().await.unwrap().version, 1);
        assert_eq!(execution.counter_value, Some(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_call() {
        let task = Arc::new(ScriptedTask::new(vec![page(1, None)]));
        let store = Arc::new(InMemoryCounterStore::new("/sechubexport/count"));
        let pagination = build(task.clone(), store.clone(), fast_retry(5));

        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        let mut interrupt = Interrupt::new(rx);

        let mut execution = ExportExecution::new(ExecutionId::new(), None);
        pagination.run(&mut execution, &mut interrupt).await.unwrap();

        assert_eq!(task.calls(), 0);
        assert_eq!(execution.outcome, Some(TerminalOutcome::Aborted));
        assert_eq!(execution.error.as_deref(), Some("execution aborted"));
        assert_eq!(store.get().await.unwrap(), 0);
    }
}
