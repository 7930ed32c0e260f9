/**
 * allocate.rs
 * Reconcile one worktree under the state lock and persist the result
 *
 * Persist order: `.env` first, then allocations.json. If the table write
 * fails the previous `.env` is put back (or removed if there was none), so
 * a failed run leaves both files as they were.
 */

use std::fs;
use std::path::Path;

use crate::envfile::{self, ENV_FILE};
use crate::errors::{Result, WtmError};
use crate::port::{is_port_available, Overrides};
use crate::project::{GlobalConfig, StatePaths, WorktreeConfig};
use crate::reconcile::{Phase, Reconciler, Reconciliation, Request};
use crate::store::{atomic_write, AllocationStore, AllocationTable, PortMap, StateLock};

#[derive(Debug, Clone, Default)]
pub struct AllocateOptions {
    pub overrides: Overrides,
    /// Probe candidate ports with a bind before handing them out
    pub validate_ports: bool,
    /// Variables to reallocate regardless of their held port
    pub evict: Vec<String>,
}

/// Worktree name used as the allocation table key
pub fn worktree_name(dir: &Path) -> Result<String> {
    dir.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| WtmError::DirectoryNotFound(dir.display().to_string()))
}

/// Reconcile the worktree at `dir` against its own .worktree.yml
pub fn allocate_worktree(
    paths: &StatePaths,
    dir: &Path,
    options: &AllocateOptions,
) -> Result<Reconciliation> {
    let config = WorktreeConfig::load_from_dir(dir)?;
    allocate_with_config(paths, dir, &config, options)
}

/// Reconcile the worktree at `dir` against an already loaded config
pub fn allocate_with_config(
    paths: &StatePaths,
    dir: &Path,
    config: &WorktreeConfig,
    options: &AllocateOptions,
) -> Result<Reconciliation> {
    if !dir.is_dir() {
        return Err(WtmError::DirectoryNotFound(dir.display().to_string()));
    }
    let name = worktree_name(dir)?;

    let _lock = StateLock::acquire(&paths.lock_file())?;
    let global = GlobalConfig::load(paths.config_file())?;
    let store = paths.store();
    let mut table = store.load()?;

    let env_path = dir.join(ENV_FILE);
    let previous_env = if env_path.is_file() {
        Some(fs::read_to_string(&env_path)?)
    } else {
        None
    };
    let env_vars = previous_env.as_deref().map(envfile::parse);

    let request = Request::new(&name, &config.variables)
        .env(env_vars.as_ref())
        .overrides(&options.overrides)
        .evict(&options.evict);

    let mut reconciler = Reconciler::new(&mut table, &global);
    if options.validate_ports {
        reconciler = reconciler.with_probe(is_port_available);
    }
    let mut outcome = reconciler.reconcile(&request)?;

    if outcome.needs_persist() {
        persist(&store, &table, &env_path, &outcome.ports, previous_env.as_deref())?;
        outcome.phase = Phase::Persisted;
        tracing::info!(
            worktree = %name,
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            updated = outcome.updated.len(),
            refreshed = outcome.refreshed.len(),
            "allocations persisted"
        );
    } else {
        tracing::debug!(worktree = %name, "allocations up to date");
    }

    Ok(outcome)
}

fn persist(
    store: &AllocationStore,
    table: &AllocationTable,
    env_path: &Path,
    ports: &PortMap,
    previous_env: Option<&str>,
) -> Result<()> {
    envfile::write(env_path, ports)?;

    if let Err(err) = store.save(table) {
        let restored = match previous_env {
            Some(content) => atomic_write(env_path, content.as_bytes()),
            None => fs::remove_file(env_path).map_err(WtmError::from),
        };
        if let Err(restore_err) = restored {
            tracing::error!(
                path = %env_path.display(),
                error = %restore_err,
                "could not restore .env after failed table write"
            );
        }
        return Err(err);
    }

    Ok(())
}
