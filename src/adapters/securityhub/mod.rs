//! Findings API integration
//!
//! [`SecurityHubClient`] implements [`FindingsSource`](crate::adapters::fetch::FindingsSource)
//! over HTTP using the GetFindings request shape.

pub mod client;
pub mod models;

pub use client::{classify_status, SecurityHubClient};
pub use models::{DateFilter, FindingFilter, StringFilter};
