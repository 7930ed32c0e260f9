//! Git worktree driver
//!
//! Thin wrapper over the `git` CLI for the handful of operations the
//! worktree workflows need. The repository is always the main checkout;
//! sibling worktrees are created next to it.
//!
//! ## Usage
//!
//! ```no_run
//! use wtm_core::drivers::{GitDriver, SystemRunner};
//! use std::path::Path;
//!
//! let runner = SystemRunner::new();
//! let git = GitDriver::open(Path::new("/work/shop"), &runner)?;
//! git.worktree_add(Path::new("/work/shop-2"), "main", None)?;
//! # Ok::<(), wtm_core::WtmError>(())
//! ```

use std::path::{Path, PathBuf};

use crate::drivers::process::{CommandOutput, ProcessRunner};
use crate::errors::{Result, WtmError};

/// Git driver bound to one main checkout
pub struct GitDriver<'a> {
    repo: PathBuf,
    runner: &'a dyn ProcessRunner,
}

impl<'a> GitDriver<'a> {
    /// Bind to `repo`, which must contain a `.git` directory
    pub fn open(repo: &Path, runner: &'a dyn ProcessRunner) -> Result<Self> {
        if !Self::is_repository(repo) {
            return Err(WtmError::NotAGitRepository(repo.display().to_string()));
        }
        Ok(GitDriver {
            repo: repo.to_path_buf(),
            runner,
        })
    }

    /// True for a main checkout (linked worktrees have a `.git` file)
    pub fn is_repository(path: &Path) -> bool {
        path.join(".git").is_dir()
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        self.runner.run("git", args, &self.repo)
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let output = self.git(&["rev-parse", "--verify", "--quiet", branch])?;
        Ok(output.success())
    }

    /// Create a worktree at `target` from `base`
    ///
    /// Without `branch` the worktree is detached. With `branch`, an existing
    /// branch is checked out, otherwise it is created from `base`.
    pub fn worktree_add(&self, target: &Path, base: &str, branch: Option<&str>) -> Result<()> {
        let target = target.to_string_lossy().into_owned();
        let target = target.as_str();

        let args: Vec<&str> = match branch {
            None => vec!["worktree", "add", "--detach", target, base],
            Some(branch) if self.branch_exists(branch)? => {
                vec!["worktree", "add", target, branch]
            }
            Some(branch) => vec!["worktree", "add", "-b", branch, target, base],
        };

        let command = format!("git {}", args.join(" "));
        self.git(&args)?.require_success(&command)?;
        tracing::info!(target = %target, base, ?branch, "worktree created");
        Ok(())
    }

    /// `git worktree remove`; the caller inspects the outcome
    pub fn worktree_remove(&self, target: &Path, force: bool) -> Result<CommandOutput> {
        let target = target.to_string_lossy().into_owned();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(target.as_str());
        self.git(&args)
    }

    /// `git status --short` inside `worktree`
    pub fn status_short(&self, worktree: &Path) -> Result<String> {
        let output = self.runner.run("git", &["status", "--short"], worktree)?;
        Ok(output.stdout)
    }
}
