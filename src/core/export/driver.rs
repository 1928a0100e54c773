//! Execution driver
//!
//! Composition root for one run: takes the workflow lease, runs the
//! pagination loop under the shutdown signal and optional deadline, gives
//! the lease back and publishes the terminal status exactly once.

use crate::adapters::factory::{create_fetch_task, create_notifier, create_state_stores};
use crate::adapters::fetch::FetchTask;
use crate::config::{ExporterConfig, DEFAULT_LEASE_TTL_SECS};
use crate::core::cancel::Interrupt;
use crate::core::export::execution::{ExportExecution, TerminalOutcome};
use crate::core::export::pagination::PaginationLoop;
use crate::core::export::summary::ExportSummary;
use crate::core::notify::{StatusEvent, StatusNotifier};
use crate::core::retry::RetryPolicy;
use crate::core::state::{CounterStore, ExecutionLease, LeaseStore, ProgressCounter};
use crate::domain::{Cursor, ExecutionId, ExportError, Result};
use crate::log_terminal_status;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Per-run settings of the driver
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    /// Lease name, one per workflow
    pub lease_name: String,
    /// Lease time-to-live
    pub lease_ttl: Option<Duration>,
    /// Wall-clock limit for one execution
    pub execution_timeout: Option<Duration>,
    /// Cause reported on failed executions
    pub failure_cause: String,
    /// Topic stamped on status events
    pub topic: String,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            lease_name: "sec_hub_finding_export".to_string(),
            lease_ttl: Some(Duration::from_secs(DEFAULT_LEASE_TTL_SECS)),
            execution_timeout: None,
            failure_cause: "Security Hub Export Failed.".to_string(),
            topic: "Security_Hub_Export_Status".to_string(),
        }
    }
}

impl DriverSettings {
    pub fn from_config(config: &ExporterConfig) -> Self {
        Self {
            lease_name: config.state.lease_name.clone(),
            lease_ttl: Some(Duration::from_secs(config.lease_ttl_secs())),
            execution_timeout: config.workflow.execution_timeout_secs.map(Duration::from_secs),
            failure_cause: config.workflow.failure_cause.clone(),
            topic: config.notification.topic.clone(),
        }
    }
}

/// Runs export executions
pub struct ExecutionDriver {
    task: Arc<dyn FetchTask>,
    counter_store: Arc<dyn CounterStore>,
    lease_store: Arc<dyn LeaseStore>,
    notifier: Arc<dyn StatusNotifier>,
    retry: RetryPolicy,
    settings: DriverSettings,
}

impl ExecutionDriver {
    /// Creates a driver with the deployed retry policy and default settings
    pub fn new(
        task: Arc<dyn FetchTask>,
        counter_store: Arc<dyn CounterStore>,
        lease_store: Arc<dyn LeaseStore>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            task,
            counter_store,
            lease_store,
            notifier,
            retry: RetryPolicy::deployed(),
            settings: DriverSettings::default(),
        }
    }

    /// Builds the full pipeline described by the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the retry policy is invalid or an adapter cannot
    /// be created.
    pub fn from_config(config: &ExporterConfig) -> Result<Self> {
        let task = create_fetch_task(config)?;
        let (counter_store, lease_store) = create_state_stores(config);
        let notifier = create_notifier(config)?;

        Ok(Self::new(task, counter_store, lease_store, notifier)
            .with_retry_policy(RetryPolicy::from_config(&config.workflow)?)
            .with_settings(DriverSettings::from_config(config)))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_settings(mut self, settings: DriverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs one execution to its terminal state
    ///
    /// `shutdown` flipping to `true` aborts the execution.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::LeaseHeld`] when another execution is running;
    /// in that case nothing is fetched and no status is published. Lease
    /// store failures are returned the same way. Every other failure is
    /// reported through the summary's outcome.
    pub async fn run(
        &self,
        starting_cursor: Option<Cursor>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ExportSummary> {
        let execution_id = ExecutionId::new();

        let lease = match ExecutionLease::acquire(
            self.lease_store.clone(),
            &self.settings.lease_name,
            execution_id,
            self.settings.lease_ttl,
        )
        .await?
        {
            Ok(lease) => lease,
            Err(held) => {
                tracing::warn!(
                    lease = %held.name,
                    holder = %held.holder,
                    acquired_at = %held.acquired_at,
                    "Another export execution is running"
                );
                return Err(ExportError::LeaseHeld {
                    lease: held.name,
                    holder: held.holder.to_string(),
                });
            }
        };

        let mut execution = ExportExecution::new(execution_id, starting_cursor);
        tracing::info!(
            execution_id = %execution.id,
            starting_cursor = execution.cursor.as_ref().map(|c| c.as_str()).unwrap_or(""),
            max_attempts = self.retry.max_attempts(),
            "Starting export execution"
        );

        let mut interrupt = Interrupt::new(shutdown);
        if let Some(timeout) = self.settings.execution_timeout {
            interrupt = interrupt.with_deadline(tokio::time::Instant::now() + timeout);
        }

        let counter = ProgressCounter::new(self.counter_store.clone());
        let pagination = PaginationLoop::new(
            self.task.clone(),
            self.retry.clone(),
            counter.clone(),
            self.settings.failure_cause.clone(),
        );

        if let Err(e) = pagination.run(&mut execution, &mut interrupt).await {
            if execution.outcome.is_none() {
                execution.finish(
                    TerminalOutcome::Failed,
                    Some(self.settings.failure_cause.clone()),
                    Some(e.to_string()),
                )?;
            }
        }

        if let Err(e) = lease.release().await {
            tracing::warn!(
                execution_id = %execution.id,
                error = %e,
                "Failed to release execution lease"
            );
        }

        let counter_value = match execution.counter_value {
            Some(value) => Some(value),
            None => counter.current().await.ok(),
        };

        self.publish(&execution, counter_value).await;

        if let Some(outcome) = execution.outcome {
            log_terminal_status!(execution.id, outcome, execution.items_exported);
        }

        Ok(ExportSummary::from_execution(&execution, counter_value))
    }

    async fn publish(&self, execution: &ExportExecution, counter_value: Option<u64>) {
        let event =
            match StatusEvent::from_execution(execution, self.settings.topic.clone(), counter_value)
            {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Cannot build status event");
                    return;
                }
            };

        if let Err(e) = self.notifier.notify(&event).await {
            tracing::warn!(
                execution_id = %execution.id,
                notifier = self.notifier.name(),
                error = %e,
                "Status notification failed"
            );
        }
    }
}
