// Sechub Export - Security findings export workflow
// Copyright (c) 2025 Sechub Export Contributors
// Licensed under the MIT License

//! # Sechub Export - Security Findings Export Workflow
//!
//! Sechub Export pulls security findings page by page from a findings API,
//! writes them to durable storage and keeps a running count of what has been
//! exported.
//!
//! ## Overview
//!
//! One *execution* walks the findings pagination:
//! - **Fetching** a batch of pages per call and storing it as one JSON object
//! - **Retrying** failed calls with exponential backoff
//! - **Counting** exported items in a durable counter after every call
//! - **Publishing** exactly one terminal status event per execution
//!
//! Only one execution runs at a time; a lease in the state directory guards
//! the workflow.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pagination loop, retry policy, state, cancellation, notification
//! - [`adapters`] - Findings API, storage, state files, webhook
//! - [`domain`] - Identifiers and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sechub_export::config::load_config;
//! use sechub_export::core::export::ExecutionDriver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("sechub-export.toml")?;
//!     let driver = ExecutionDriver::from_config(&config)?;
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let summary = driver.run(None, shutdown_rx).await?;
//!
//!     println!("{}: exported {} findings", summary.outcome, summary.items_exported);
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Fetch Tasks
//!
//! The driver accepts any [`adapters::fetch::FetchTask`], so the pagination
//! loop can be reused for sources other than the findings API:
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use sechub_export::adapters::fetch::{FetchRequest, FetchResult, FetchTask};
//! use sechub_export::domain::FetchError;
//!
//! struct Empty;
//!
//! #[async_trait]
//! impl FetchTask for Empty {
//!     async fn fetch(&self, _request: FetchRequest) -> Result<FetchResult, FetchError> {
//!         Ok(FetchResult { items_processed: 0, next_cursor: None })
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! Sechub Export uses structured logging with the `tracing` crate. Every log
//! line of an execution carries its `execution_id`.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
