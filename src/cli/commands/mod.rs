//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod export;
pub mod init;
pub mod release_lease;
pub mod reset_counter;
pub mod status;
pub mod validate;
