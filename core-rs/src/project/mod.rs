/**
 * project module
 * Per-project (.worktree.yml) and user-level (config.yml) configuration,
 * state locations and project type detection
 */

pub mod config;
pub mod detect;
pub mod global;
pub mod hooks;
pub mod paths;

pub use config::{WorktreeConfig, WORKTREE_CONFIG_FILE};
pub use detect::ProjectKind;
pub use global::GlobalConfig;
pub use hooks::{HookCommand, HookKind, Hooks};
pub use paths::{expand_path, StatePaths, HOME_ENV};
