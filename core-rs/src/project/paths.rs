/**
 * paths.rs
 * Location of the tool's own state
 *
 * State lives in: ~/.config/worktree-manager/
 * - config.yml        reserved ports and registered roots
 * - allocations.json  the allocation table
 * - allocations.lock  advisory lock guarding both
 *
 * WORKTREE_MANAGER_HOME overrides the directory.
 */

use std::env;
use std::path::{Path, PathBuf};

use crate::errors::{Result, WtmError};
use crate::store::AllocationStore;

/// Environment variable overriding the state directory
pub const HOME_ENV: &str = "WORKTREE_MANAGER_HOME";

pub const CONFIG_FILE: &str = "config.yml";
pub const ALLOCATIONS_FILE: &str = "allocations.json";
const LOCK_FILE: &str = "allocations.lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    dir: PathBuf,
}

impl StatePaths {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        StatePaths {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Resolve from WORKTREE_MANAGER_HOME, falling back to ~/.config/worktree-manager
    pub fn from_env() -> Result<Self> {
        if let Ok(dir) = env::var(HOME_ENV) {
            if !dir.trim().is_empty() {
                return Ok(Self::new(expand_path(&dir)));
            }
        }

        let home_dir = env::var("HOME").map_err(|_| {
            WtmError::ConfigInvalid("HOME environment variable not set".to_string())
        })?;

        Ok(Self::new(
            PathBuf::from(home_dir)
                .join(".config")
                .join("worktree-manager"),
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn allocations_file(&self) -> PathBuf {
        self.dir.join(ALLOCATIONS_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub fn store(&self) -> AllocationStore {
        AllocationStore::new(self.allocations_file())
    }
}

/// Expand a leading `~` to $HOME
pub fn expand_path(path: &str) -> PathBuf {
    let home = env::var("HOME").ok();

    match (path, home) {
        ("~", Some(home)) => PathBuf::from(home),
        (p, Some(home)) if p.starts_with("~/") => PathBuf::from(home).join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
