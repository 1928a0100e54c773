//! Terminal status notification
//!
//! The driver publishes exactly one [`StatusEvent`] per execution, after the
//! terminal state and the final counter write. Delivery failures are logged
//! by the driver and never change the outcome.

use crate::core::export::execution::{ExportExecution, TerminalOutcome};
use crate::domain::{ExecutionId, ExportError, NotifyError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Terminal status of one execution, as published to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub execution_id: ExecutionId,
    pub status: TerminalOutcome,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub items_exported: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_value: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl StatusEvent {
    /// Builds the event for a terminal execution
    ///
    /// # Errors
    ///
    /// Returns a validation error if the execution has no outcome yet.
    pub fn from_execution(
        execution: &ExportExecution,
        topic: impl Into<String>,
        counter_value: Option<u64>,
    ) -> Result<Self> {
        let (status, ended_at) = match (execution.outcome, execution.ended_at) {
            (Some(status), Some(ended_at)) => (status, ended_at),
            _ => {
                return Err(ExportError::Validation(format!(
                    "execution {} is not terminal",
                    execution.id
                )))
            }
        };

        Ok(Self {
            execution_id: execution.id,
            status,
            topic: topic.into(),
            cause: execution.cause.clone(),
            error: execution.error.clone(),
            items_exported: execution.items_exported,
            counter_value,
            started_at: execution.started_at,
            ended_at,
        })
    }
}

/// Receives terminal status events
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Delivers one event
    async fn notify(&self, event: &StatusEvent) -> std::result::Result<(), NotifyError>;
}

/// Writes the event to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl StatusNotifier for TracingNotifier {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn notify(&self, event: &StatusEvent) -> std::result::Result<(), NotifyError> {
        tracing::info!(
            topic = %event.topic,
            execution_id = %event.execution_id,
            status = %event.status,
            cause = event.cause.as_deref().unwrap_or(""),
            error = event.error.as_deref().unwrap_or(""),
            items_exported = event.items_exported,
            counter_value = event.counter_value,
            "Export status published"
        );
        Ok(())
    }
}

/// In-process fan-out channel for status events
///
/// Subscribers attach with [`BroadcastNotifier::subscribe`]. Publishing with
/// nobody subscribed is a [`NotifyError::NoSubscribers`] error.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    topic: String,
    sender: broadcast::Sender<StatusEvent>,
}

impl BroadcastNotifier {
    /// Creates a channel buffering up to `capacity` events per subscriber
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            sender,
        }
    }

    /// Attaches a new subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    /// Number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl StatusNotifier for BroadcastNotifier {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn notify(&self, event: &StatusEvent) -> std::result::Result<(), NotifyError> {
        self.sender
            .send(event.clone())
            .map(|receivers| {
                tracing::debug!(topic = %self.topic, receivers, "Status event broadcast");
            })
            .map_err(|_| NotifyError::NoSubscribers(self.topic.clone()))
    }
}

/// Delivers to every inner notifier concurrently
///
/// All notifiers are attempted; the first failure is returned.
#[derive(Clone, Default)]
pub struct FanOutNotifier {
    notifiers: Vec<Arc<dyn StatusNotifier>>,
}

impl FanOutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn StatusNotifier>>) -> Self {
        Self { notifiers }
    }

    /// Adds a notifier
    pub fn with(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl StatusNotifier for FanOutNotifier {
    fn name(&self) -> &str {
        "fan-out"
    }

    async fn notify(&self, event: &StatusEvent) -> std::result::Result<(), NotifyError> {
        let deliveries = self.notifiers.iter().map(|notifier| async move {
            let result = notifier.notify(event).await;
            if let Err(ref e) = result {
                tracing::warn!(
                    notifier = notifier.name(),
                    error = %e,
                    "Status notifier failed"
                );
            }
            result
        });

        futures::future::join_all(deliveries)
            .await
            .into_iter()
            .collect::<std::result::Result<Vec<()>, NotifyError>>()
            .map(|_| ())
    }
}
