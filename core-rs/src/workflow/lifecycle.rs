/**
 * lifecycle.rs
 * install / migrate / up / down for one worktree
 *
 * Resolution order for each step:
 * 1. hooks.<step> in .worktree.yml
 * 2. executable file .worktree/hooks/<step>
 * 3. built-in fallback (project detection, or docker compose for up/down)
 *
 * A hook entry naming an existing file inside the worktree runs that file;
 * anything else runs through `sh -c`. The first failing entry aborts.
 */

use std::path::Path;

use crate::drivers::ProcessRunner;
use crate::errors::Result;
use crate::project::{HookKind, Hooks, ProjectKind, WorktreeConfig};

/// Directory holding file-based hooks, relative to the worktree
pub const HOOKS_DIR: &str = ".worktree/hooks";

/// How a lifecycle step was carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A hook from .worktree.yml or .worktree/hooks ran
    Hook,
    /// Fallback for a detected project type
    Detected(&'static str),
    /// docker compose fallback
    Compose,
}

/// Run the hook for `kind`, if one is configured
///
/// # Returns
/// `true` when a hook ran (successfully), `false` when none exists
pub fn run_hook(
    kind: HookKind,
    hooks: &Hooks,
    dir: &Path,
    runner: &dyn ProcessRunner,
) -> Result<bool> {
    if let Some(command) = hooks.get(kind) {
        for entry in command.commands() {
            run_entry(entry, dir, runner)?;
        }
        return Ok(true);
    }

    let hook_file = dir.join(HOOKS_DIR).join(kind.as_str());
    if hook_file.is_file() {
        let program = hook_file.to_string_lossy().into_owned();
        tracing::info!(hook = %kind, file = %program, "running hook file");
        runner.run(&program, &[], dir)?.require_success(&program)?;
        return Ok(true);
    }

    Ok(false)
}

fn run_entry(entry: &str, dir: &Path, runner: &dyn ProcessRunner) -> Result<()> {
    let candidate = dir.join(entry);
    let output = if candidate.is_file() {
        let program = candidate.to_string_lossy().into_owned();
        tracing::info!(file = %program, "running hook file");
        runner.run(&program, &[], dir)?
    } else {
        tracing::info!(command = entry, "running hook command");
        runner.run_shell(entry, dir)?
    };
    output.require_success(entry)?;
    Ok(())
}

pub fn install(dir: &Path, runner: &dyn ProcessRunner) -> Result<StepOutcome> {
    let hooks = WorktreeConfig::load_hooks(dir)?;
    if run_hook(HookKind::Install, &hooks, dir, runner)? {
        return Ok(StepOutcome::Hook);
    }

    let kind = ProjectKind::detect(dir);
    kind.install(runner)?;
    Ok(StepOutcome::Detected(kind.name()))
}

pub fn migrate(dir: &Path, runner: &dyn ProcessRunner) -> Result<StepOutcome> {
    let hooks = WorktreeConfig::load_hooks(dir)?;
    if run_hook(HookKind::Migrate, &hooks, dir, runner)? {
        return Ok(StepOutcome::Hook);
    }

    let kind = ProjectKind::detect(dir);
    kind.migrate(runner)?;
    Ok(StepOutcome::Detected(kind.name()))
}

pub fn up(dir: &Path, runner: &dyn ProcessRunner) -> Result<StepOutcome> {
    compose_step(HookKind::Up, &["compose", "up", "-d"], dir, runner)
}

pub fn down(dir: &Path, runner: &dyn ProcessRunner) -> Result<StepOutcome> {
    compose_step(HookKind::Down, &["compose", "down"], dir, runner)
}

fn compose_step(
    kind: HookKind,
    args: &[&str],
    dir: &Path,
    runner: &dyn ProcessRunner,
) -> Result<StepOutcome> {
    let hooks = WorktreeConfig::load_hooks(dir)?;
    if run_hook(kind, &hooks, dir, runner)? {
        return Ok(StepOutcome::Hook);
    }

    let command = format!("docker {}", args.join(" "));
    tracing::info!(step = %kind, command = %command, "running compose fallback");
    runner.run("docker", args, dir)?.require_success(&command)?;
    Ok(StepOutcome::Compose)
}
