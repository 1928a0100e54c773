//! Fetch task contract and the findings export task
//!
//! - [`traits`] - [`FetchTask`], [`FindingsSource`] and their request/response types
//! - [`findings`] - [`FindingsFetchTask`], which pages findings from a source into a sink

pub mod findings;
pub mod traits;

pub use findings::{object_key, FindingsFetchTask};
pub use traits::{FetchRequest, FetchResult, FetchTask, FindingsPage, FindingsSource};
