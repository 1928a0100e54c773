//! Export orchestration
//!
//! - [`execution`] - the execution record and its state machine
//! - [`pagination`] - the fetch/count/continue loop
//! - [`driver`] - lease, loop, notification for one run
//! - [`summary`] - the result handed back to callers

pub mod driver;
pub mod execution;
pub mod pagination;
pub mod summary;

pub use driver::{DriverSettings, ExecutionDriver};
pub use execution::{ExecutionState, ExportExecution, TerminalOutcome};
pub use pagination::PaginationLoop;
pub use summary::ExportSummary;
