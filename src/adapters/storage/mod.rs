//! Findings storage
//!
//! - [`traits`] - the [`FindingsSink`] abstraction
//! - [`filesystem`] - [`FileSystemSink`], atomic file writes under a root directory

pub mod filesystem;
pub mod traits;

pub use filesystem::FileSystemSink;
pub use traits::FindingsSink;
