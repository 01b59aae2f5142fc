// ============================================================================
// src/cmd/mod.rs – command subsystem root
// ============================================================================
pub mod base; // external process execution (Cmd, Runner)
pub mod doctor; // host dependency check
pub mod provision; // provision workflow

#[cfg(test)]
pub mod fake;

pub use base::{Cmd, OutputData, Runner, SystemRunner};
