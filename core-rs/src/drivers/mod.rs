//! Drivers for external tools
//!
//! - ProcessRunner: subprocess seam (SystemRunner runs real processes)
//! - GitDriver: git worktree operations on top of a ProcessRunner

mod git;
mod process;

pub use git::GitDriver;
pub use process::{CommandOutput, ProcessRunner, SystemRunner};
