//! Durable parameter storage for the export counter and execution lease

pub mod file;

pub use file::{FileCounterStore, FileLeaseStore};
