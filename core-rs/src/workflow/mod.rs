/// Workflows behind the `worktree` commands
///
/// Each workflow loads the state it needs through [`StatePaths`], takes the
/// state lock around table mutations, and reports what it did through a
/// plain outcome struct. Printing is left to the binary.
///
/// - allocate: reconcile one worktree (the core operation)
/// - reserve: reserve a port and move its holders
/// - roots / scan: registered project roots and table rebuild
/// - worktree: create and remove sibling git worktrees
/// - lifecycle: install / migrate / up / down with hooks

pub mod allocate;
pub mod lifecycle;
pub mod reserve;
pub mod roots;
pub mod scan;
pub mod worktree;

pub use allocate::{allocate_with_config, allocate_worktree, worktree_name, AllocateOptions};
pub use lifecycle::{run_hook, StepOutcome, HOOKS_DIR};
pub use reserve::{reserve_port, Eviction, ReserveOutcome};
pub use roots::{add_root, list_roots, locate_worktree, remove_root};
pub use scan::{find_worktree_dirs, scan_roots, ScanReport, ScannedWorktree};
pub use worktree::{
    create_worktree, next_worktree_name, remove_worktree, NewOptions, NewOutcome, RemoveOutcome,
};

use crate::errors::Result;
use crate::project::StatePaths;
use crate::store::AllocationTable;

/// Current allocation table; writes are atomic so no lock is needed to read
pub fn load_allocations(paths: &StatePaths) -> Result<AllocationTable> {
    paths.store().load()
}
