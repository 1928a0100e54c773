//! Counter and lease state
//!
//! - [`counter`] - the durable running count of exported findings
//! - [`lease`] - the single-execution lease

pub mod counter;
pub mod lease;

pub use counter::{CounterRecord, CounterStore, InMemoryCounterStore, ProgressCounter, StateResult};
pub use lease::{ExecutionLease, InMemoryLeaseStore, LeaseAcquisition, LeaseRecord, LeaseStore};
