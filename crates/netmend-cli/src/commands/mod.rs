//! Command implementations for the `netmend` binary.

pub mod context;
pub mod plan;
pub mod queue;
pub mod session;
