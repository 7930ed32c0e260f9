/**
 * scan.rs
 * Rebuild the allocation table from what is on disk
 *
 * Each registered root is walked (depth ≤ 2) for directories holding a
 * .worktree.yml. For each one the declared variables are read back from
 * its .env; the resulting table replaces allocations.json unless this is
 * a dry run. Problems are collected, never fatal:
 * - errors: broken .worktree.yml, missing .env
 * - warnings: declared variable absent from .env or not a valid port,
 *   duplicate worktree names, missing roots
 * - conflicts: one port held by more than one (worktree, variable)
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::envfile::{self, port_value, ENV_FILE};
use crate::errors::{Result, WtmError};
use crate::port::range::in_bounds;
use crate::project::{expand_path, GlobalConfig, StatePaths, WorktreeConfig};
use crate::store::{AllocationTable, Holder, PortMap, StateLock};
use crate::workflow::roots::has_worktree_config;

const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor"];
const MAX_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedWorktree {
    pub name: String,
    pub path: PathBuf,
    pub ports: PortMap,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub table: AllocationTable,
    pub worktrees: Vec<ScannedWorktree>,
    pub conflicts: BTreeMap<u16, Vec<Holder>>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub saved: bool,
}

pub fn scan_roots(paths: &StatePaths, dry_run: bool) -> Result<ScanReport> {
    let _lock = StateLock::acquire(&paths.lock_file())?;
    let global = GlobalConfig::load(paths.config_file())?;
    if global.roots.is_empty() {
        return Err(WtmError::NoRootsRegistered);
    }

    let mut report = ScanReport::default();
    for root in &global.roots {
        let root_path = expand_path(root);
        if !root_path.is_dir() {
            report.warnings.push(format!("Root does not exist: {}", root));
            continue;
        }

        for dir in find_worktree_dirs(&root_path) {
            scan_worktree(&dir, &mut report);
        }
    }

    report.conflicts = report.table.conflicts();
    tracing::info!(
        worktrees = report.worktrees.len(),
        conflicts = report.conflicts.len(),
        warnings = report.warnings.len(),
        errors = report.errors.len(),
        "scan finished"
    );

    if !dry_run {
        paths.store().save(&report.table)?;
        report.saved = true;
    }
    Ok(report)
}

/// Directories under `root` (excluding `root` itself) that hold a .worktree.yml
pub fn find_worktree_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.file_type().is_dir()
                && !name.starts_with('.')
                && !SKIPPED_DIRS.iter().any(|skipped| *skipped == name)
        })
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|dir| has_worktree_config(dir))
        .collect()
}

fn scan_worktree(dir: &Path, report: &mut ScanReport) {
    let name = match dir.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => return,
    };

    let config = match WorktreeConfig::load_from_dir(dir) {
        Ok(config) => config,
        Err(err) => {
            report.errors.push(format!("{}: {}", dir.display(), err));
            return;
        }
    };

    let env = match envfile::read_if_exists(&dir.join(ENV_FILE)) {
        Ok(Some(env)) => env,
        Ok(None) => {
            report.errors.push(format!(
                "{}: no {} file (run `worktree allocate` inside it)",
                dir.display(),
                ENV_FILE
            ));
            return;
        }
        Err(err) => {
            report.errors.push(format!("{}: {}", dir.display(), err));
            return;
        }
    };

    let mut ports = PortMap::new();
    for spec in &config.variables {
        match env.get(&spec.name) {
            None => report.warnings.push(format!(
                "{}: {} is declared but missing from {}",
                name, spec.name, ENV_FILE
            )),
            Some(value) => match port_value(value).filter(|p| in_bounds(u64::from(*p))) {
                Some(port) => {
                    ports.insert(spec.name.clone(), port);
                }
                None => report.warnings.push(format!(
                    "{}: {}={} is not a valid port",
                    name, spec.name, value
                )),
            },
        }
    }

    if report.worktrees.iter().any(|w| w.name == name) {
        report.warnings.push(format!(
            "{}: another worktree named '{}' was already scanned; keeping the last one",
            dir.display(),
            name
        ));
        report.worktrees.retain(|w| w.name != name);
    }

    tracing::debug!(worktree = %name, path = %dir.display(), ports = ports.len(), "scanned worktree");
    report.table.set_worktree(&name, ports.clone());
    report.worktrees.push(ScannedWorktree {
        name,
        path: dir.to_path_buf(),
        ports,
    });
}
