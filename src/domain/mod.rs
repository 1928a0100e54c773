//! Domain types for the exporter.
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ExecutionId`], [`Cursor`])
//! - **Error types** ([`ExportError`], [`FetchError`], [`StateError`], [`NotifyError`])
//! - **Error classification** ([`ErrorClass`], [`Classify`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ExportError>`]:
//!
//! ```rust
//! use sechub_export::domain::{ExportError, Result};
//!
//! fn example() -> Result<()> {
//!     // Errors are automatically converted using the ? operator
//!     let _config = sechub_export::config::load_config("sechub-export.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{Classify, ErrorClass, ExportError, FetchError, NotifyError, StateError};
pub use ids::{Cursor, ExecutionId};
pub use result::Result;
