//! Adapter factory
//!
//! Builds the concrete fetch task, state stores and notifiers described by
//! the configuration.

use crate::adapters::fetch::{FetchTask, FindingsFetchTask};
use crate::adapters::notify::WebhookNotifier;
use crate::adapters::parameter::{FileCounterStore, FileLeaseStore};
use crate::adapters::securityhub::SecurityHubClient;
use crate::adapters::storage::FileSystemSink;
use crate::config::ExporterConfig;
use crate::core::notify::{FanOutNotifier, StatusNotifier, TracingNotifier};
use crate::core::state::{CounterStore, LeaseStore};
use crate::domain::Result;
use std::sync::Arc;

/// Create the findings fetch task: HTTP source into the filesystem sink
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created
pub fn create_fetch_task(config: &ExporterConfig) -> Result<Arc<dyn FetchTask>> {
    let source = Arc::new(SecurityHubClient::new(&config.source)?);
    let sink = Arc::new(FileSystemSink::new(&config.storage.path));

    tracing::info!(
        endpoint = %config.source.endpoint,
        region = %config.source.region,
        storage = %config.storage.path,
        "Creating findings fetch task"
    );

    Ok(Arc::new(FindingsFetchTask::from_config(
        source,
        sink,
        &config.source,
        &config.storage,
    )))
}

/// Create the file-backed counter and lease stores
pub fn create_state_stores(
    config: &ExporterConfig,
) -> (Arc<dyn CounterStore>, Arc<dyn LeaseStore>) {
    let counter: Arc<dyn CounterStore> = Arc::new(FileCounterStore::new(
        &config.state.path,
        config.state.counter_parameter.clone(),
    ));
    let lease: Arc<dyn LeaseStore> = Arc::new(FileLeaseStore::new(&config.state.path));
    (counter, lease)
}

/// Create the status notifier: always the log, plus the webhook if configured
///
/// # Errors
///
/// Returns an error if the webhook client cannot be created
pub fn create_notifier(config: &ExporterConfig) -> Result<Arc<dyn StatusNotifier>> {
    let mut notifier = FanOutNotifier::default().with(Arc::new(TracingNotifier));

    if let Some(webhook) = WebhookNotifier::from_config(&config.notification)? {
        tracing::info!("Status webhook enabled");
        notifier = notifier.with(Arc::new(webhook));
    }

    Ok(Arc::new(notifier))
}
