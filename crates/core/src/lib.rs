//! Domain types shared by the Scrooge client crates.
//!
//! Nothing in here performs I/O. The modules describe the wire format of
//! the cost-recalculation and report endpoints, the bookkeeping of a single
//! poll loop, and the dashboard's filter and allocation state.

pub mod allocation;
pub mod error;
pub mod filters;
pub mod flash;
pub mod job;
pub mod poll;
pub mod report;
pub mod types;
