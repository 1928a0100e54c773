//! Status notifiers backed by external systems

pub mod webhook;

pub use webhook::WebhookNotifier;
