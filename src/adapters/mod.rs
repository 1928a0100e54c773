//! External system integrations.
//!
//! - [`fetch`] - The fetch task seam and the findings fetch task
//! - [`securityhub`] - HTTP client for the findings API
//! - [`storage`] - Object sinks for exported batches
//! - [`parameter`] - File-backed counter and lease stores
//! - [`notify`] - Webhook status notifier
//! - [`factory`] - Builds the adapters named by the configuration
//!
//! Adapters sit behind the traits in [`fetch`], [`storage`],
//! [`crate::core::state`] and [`crate::core::notify`], so the workflow can
//! be tested with in-memory implementations.

pub mod factory;
pub mod fetch;
pub mod notify;
pub mod parameter;
pub mod securityhub;
pub mod storage;
