//! # wtm-core - Worktree Port Manager
//!
//! Gives every git worktree of a project its own non-colliding set of
//! service ports (HTTP, Vite, database, ...) and keeps the worktree's
//! `.env` file in sync with a global allocation table.
//!
//! ## Core Principle
//!
//! **Declare ranges, not ports**: a project's `.worktree.yml` names each
//! port variable and the range it may come from. The first free port of
//! each range is allocated in declaration order, skipping every port held
//! by another worktree and every globally reserved port.
//!
//! ## State
//!
//! ```text
//! ~/.config/worktree-manager/
//! ├── config.yml         reserved_ports, roots
//! ├── allocations.json   worktree → { VAR: port }
//! └── allocations.lock   advisory lock
//!
//! <worktree>/
//! ├── .worktree.yml      VAR: { port_range: "8000.." }
//! └── .env               VAR=port (generated)
//! ```
//!
//! ## Layers
//!
//! - `port`, `store`, `envfile`: pure allocation primitives and file codecs
//! - `reconcile`: converges one worktree against loaded state
//! - `workflow`: locking, persistence and the git/docker side of each command
//! - `drivers`: subprocess seam used by workflows only

pub mod drivers;
pub mod envfile;
pub mod errors;
pub mod port;
pub mod project;
pub mod reconcile;
pub mod store;
pub mod workflow;

pub use drivers::{CommandOutput, GitDriver, ProcessRunner, SystemRunner};
pub use errors::{Result, WtmError};
pub use port::{parse_assignments, Allocator, PortRange, ReservedPort, VariableSpec};
pub use project::{GlobalConfig, HookKind, ProjectKind, StatePaths, WorktreeConfig, WORKTREE_CONFIG_FILE};
pub use reconcile::{Phase, PortChange, Reconciler, Reconciliation, Request};
pub use store::{AllocationStore, AllocationTable, PortMap, StateLock};
pub use workflow::{allocate_worktree, AllocateOptions};

/// Version of the worktree manager
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
