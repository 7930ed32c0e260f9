//! Registered project roots (`roots` in config.yml)
//!
//! Roots are the directories `scan` walks and `reserve-port` searches when
//! it needs to find a worktree by name.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, WtmError};
use crate::project::{expand_path, GlobalConfig, StatePaths, WORKTREE_CONFIG_FILE};
use crate::store::StateLock;

/// Register `dir`; stored canonicalized. Returns the stored path and whether it was new
pub fn add_root(paths: &StatePaths, dir: &str) -> Result<(PathBuf, bool)> {
    let expanded = expand_path(dir);
    if !expanded.is_dir() {
        return Err(WtmError::DirectoryNotFound(dir.to_string()));
    }
    let canonical = fs::canonicalize(&expanded)?;

    let _lock = StateLock::acquire(&paths.lock_file())?;
    let mut config = GlobalConfig::load(paths.config_file())?;
    let added = config.add_root(&canonical.to_string_lossy());
    if added {
        config.save(paths.config_file())?;
        tracing::info!(root = %canonical.display(), "root registered");
    }

    Ok((canonical, added))
}

/// Unregister `dir`, matching either the literal or the canonical form
pub fn remove_root(paths: &StatePaths, dir: &str) -> Result<bool> {
    let expanded = expand_path(dir);
    let canonical = fs::canonicalize(&expanded).unwrap_or_else(|_| expanded.clone());

    let _lock = StateLock::acquire(&paths.lock_file())?;
    let mut config = GlobalConfig::load(paths.config_file())?;

    let mut removed = config.remove_root(dir);
    for candidate in [&expanded, &canonical] {
        removed |= config.remove_root(&candidate.to_string_lossy());
    }

    if removed {
        config.save(paths.config_file())?;
        tracing::info!(root = dir, "root unregistered");
    }
    Ok(removed)
}

pub fn list_roots(paths: &StatePaths) -> Result<Vec<String>> {
    Ok(GlobalConfig::load(paths.config_file())?.roots)
}

/// First `<root>/<name>` holding a .worktree.yml
pub fn locate_worktree(roots: &[String], name: &str) -> Option<PathBuf> {
    roots
        .iter()
        .map(|root| expand_path(root).join(name))
        .find(|candidate| has_worktree_config(candidate))
}

pub(crate) fn has_worktree_config(dir: &Path) -> bool {
    dir.join(WORKTREE_CONFIG_FILE).is_file()
}
