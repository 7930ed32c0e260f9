/**
 * worktree.rs
 * Create and remove sibling worktrees of a main checkout
 *
 * Layout: the main checkout `/work/shop` gets siblings `/work/shop-2`,
 * `/work/shop-3`, ... The next number is one past the highest existing
 * sibling, starting at 2.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::drivers::{GitDriver, ProcessRunner};
use crate::errors::{Result, WtmError};
use crate::project::{StatePaths, WorktreeConfig};
use crate::reconcile::Reconciliation;
use crate::store::{PortMap, StateLock};
use crate::workflow::allocate::{allocate_with_config, worktree_name, AllocateOptions};
use crate::workflow::lifecycle::{self, StepOutcome};

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]*$").expect("worktree number pattern is valid"));

const COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

#[derive(Debug, Clone)]
pub struct NewOptions {
    pub branch: Option<String>,
    pub base: String,
    pub validate_ports: bool,
    pub install: bool,
}

impl Default for NewOptions {
    fn default() -> Self {
        NewOptions {
            branch: None,
            base: "main".to_string(),
            validate_ports: false,
            install: false,
        }
    }
}

#[derive(Debug)]
pub struct NewOutcome {
    pub name: String,
    pub path: PathBuf,
    pub allocation: Reconciliation,
    pub install: Option<StepOutcome>,
}

#[derive(Debug)]
pub struct RemoveOutcome {
    pub name: String,
    pub path: PathBuf,
    /// Ports released from the allocation table
    pub released: Option<PortMap>,
    pub warnings: Vec<String>,
}

/// Next free `<base>-N` sibling name for `main_dir`
pub fn next_worktree_name(main_dir: &Path) -> Result<String> {
    let base = worktree_name(main_dir)?;
    let parent = parent_dir(main_dir)?;
    let pattern = Regex::new(&format!(r"^{}-(\d+)$", regex::escape(&base)))
        .map_err(|e| WtmError::ConfigInvalid(e.to_string()))?;

    let highest = fs::read_dir(parent)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            pattern
                .captures(&name)
                .and_then(|caps| caps[1].parse::<u32>().ok())
        })
        .max();

    let next = highest.map_or(2, |n| n.max(1) + 1);
    Ok(format!("{}-{}", base, next))
}

/// Create the next sibling worktree and allocate its ports
pub fn create_worktree(
    paths: &StatePaths,
    main_dir: &Path,
    options: &NewOptions,
    runner: &dyn ProcessRunner,
) -> Result<NewOutcome> {
    let git = GitDriver::open(main_dir, runner)?;
    // fail on a broken .worktree.yml before touching git
    let config = WorktreeConfig::load_from_dir(main_dir)?;

    if !git.branch_exists(&options.base)? {
        return Err(WtmError::BranchNotFound(options.base.clone()));
    }

    let name = next_worktree_name(main_dir)?;
    let path = parent_dir(main_dir)?.join(&name);
    if path.exists() {
        return Err(WtmError::WorktreeExists(path.display().to_string()));
    }

    git.worktree_add(&path, &options.base, options.branch.as_deref())?;

    // an uncommitted .worktree.yml only exists in the main checkout
    let config = match WorktreeConfig::load_from_dir(&path) {
        Ok(own) => own,
        Err(WtmError::ConfigNotFound { .. }) => config,
        Err(err) => return Err(err),
    };

    let allocate = AllocateOptions {
        validate_ports: options.validate_ports,
        ..Default::default()
    };
    let allocation = allocate_with_config(paths, &path, &config, &allocate)?;

    let install = if options.install {
        Some(lifecycle::install(&path, runner)?)
    } else {
        None
    };

    Ok(NewOutcome {
        name,
        path,
        allocation,
        install,
    })
}

/// Remove sibling `<base>-<number>` and release its ports
pub fn remove_worktree(
    paths: &StatePaths,
    main_dir: &Path,
    number: &str,
    force: bool,
    runner: &dyn ProcessRunner,
) -> Result<RemoveOutcome> {
    if !NUMBER_RE.is_match(number) {
        return Err(WtmError::InvalidWorktreeNumber(number.to_string()));
    }

    let git = GitDriver::open(main_dir, runner)?;
    let name = format!("{}-{}", worktree_name(main_dir)?, number);
    let path = parent_dir(main_dir)?.join(&name);
    if !path.is_dir() {
        return Err(WtmError::WorktreeNotFound(path.display().to_string()));
    }

    let mut warnings = Vec::new();
    if let Some(warning) = stop_containers(&path, runner) {
        warnings.push(warning);
    }

    let output = git.worktree_remove(&path, force)?;
    if !output.success() {
        let dirty = output.stderr.contains("modified or untracked files")
            || output.stderr.contains("use --force");
        if dirty && !force {
            let status = git.status_short(&path).unwrap_or_default();
            return Err(WtmError::WorktreeDirty {
                path: path.display().to_string(),
                status,
            });
        }
        output.require_success(&format!("git worktree remove {}", path.display()))?;
    }

    let released = {
        let _lock = StateLock::acquire(&paths.lock_file())?;
        let store = paths.store();
        let mut table = store.load()?;
        let released = table.remove_worktree(&name);
        if released.is_some() {
            store.save(&table)?;
        }
        released
    };

    tracing::info!(worktree = %name, released = released.is_some(), "worktree removed");
    Ok(RemoveOutcome {
        name,
        path,
        released,
        warnings,
    })
}

/// `docker compose down -v` when the worktree has a compose file; failures are advisory
fn stop_containers(path: &Path, runner: &dyn ProcessRunner) -> Option<String> {
    if !COMPOSE_FILES.iter().any(|file| path.join(file).is_file()) {
        return None;
    }

    match runner.run("docker", &["compose", "down", "-v"], path) {
        Ok(output) if output.success() => None,
        Ok(output) => Some(format!(
            "docker compose down -v failed: {}",
            output.stderr.trim()
        )),
        Err(err) => Some(format!("docker compose down -v failed: {}", err)),
    }
}

fn parent_dir(dir: &Path) -> Result<&Path> {
    dir.parent()
        .ok_or_else(|| WtmError::DirectoryNotFound(dir.display().to_string()))
}
