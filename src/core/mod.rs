//! Core workflow logic.
//!
//! # Modules
//!
//! - [`export`] - Execution state machine, pagination loop and driver
//! - [`retry`] - Exponential backoff retry policy
//! - [`state`] - Durable progress counter and execution lease
//! - [`cancel`] - Abort signal and execution deadline
//! - [`notify`] - Terminal status events and notifiers
//!
//! # Execution Workflow
//!
//! 1. **Lease**: Take the workflow lease, or stop if another execution holds it
//! 2. **Fetch**: Call the fetch task with the current cursor, retrying failures
//! 3. **Count**: Add the call's item count to the durable counter
//! 4. **Continue**: Repeat with the returned cursor until none is returned
//! 5. **Publish**: Release the lease and publish the terminal status once

pub mod cancel;
pub mod export;
pub mod notify;
pub mod retry;
pub mod state;
