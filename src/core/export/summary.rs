//! Export summary and reporting

use crate::core::export::execution::{ExportExecution, TerminalOutcome};
use crate::domain::ExecutionId;
use serde::Serialize;
use std::time::Duration;

/// Result of one execution, returned by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Execution identifier
    pub execution_id: ExecutionId,

    /// How the execution ended
    pub outcome: TerminalOutcome,

    /// Items exported by this execution
    pub items_exported: u64,

    /// Counter value after the execution, if it could be read
    pub counter_value: Option<u64>,

    /// Completed fetch calls
    pub pages_fetched: u32,

    /// Wall-clock duration
    #[serde(with = "duration_ms")]
    pub duration: Duration,

    /// Operator-facing failure cause
    pub cause: Option<String>,

    /// Captured error text
    pub error: Option<String>,
}

impl ExportSummary {
    /// Summarises a terminal execution
    ///
    /// An execution without an outcome is reported as failed.
    pub fn from_execution(execution: &ExportExecution, counter_value: Option<u64>) -> Self {
        Self {
            execution_id: execution.id,
            outcome: execution.outcome.unwrap_or(TerminalOutcome::Failed),
            items_exported: execution.items_exported,
            counter_value,
            pages_fetched: execution.pages_fetched,
            duration: execution.duration(),
            cause: execution.cause.clone(),
            error: execution.error.clone(),
        }
    }

    /// Check if the execution succeeded
    pub fn is_successful(&self) -> bool {
        self.outcome.is_success()
    }

    /// Throughput over the whole execution
    pub fn items_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.items_exported as f64 / secs
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            execution_id = %self.execution_id,
            status = %self.outcome,
            items_exported = self.items_exported,
            counter_value = self.counter_value,
            pages_fetched = self.pages_fetched,
            duration_ms = self.duration.as_millis() as u64,
            "Export summary"
        );

        if let Some(ref error) = self.error {
            tracing::error!(
                execution_id = %self.execution_id,
                cause = self.cause.as_deref().unwrap_or(""),
                error = %error,
                "Export did not succeed"
            );
        }
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
