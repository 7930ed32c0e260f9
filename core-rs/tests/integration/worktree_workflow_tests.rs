//! Worktree Workflow Integration Tests
//!
//! Exercises the git/docker side of the CLI (new, remove, scan,
//! reserve-port, lifecycle steps) with a scripted process runner, so no
//! real git or docker is needed.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wtm_core::envfile::ENV_FILE;
use wtm_core::workflow::{
    add_root, create_worktree, lifecycle, remove_worktree, reserve_port, scan_roots, Eviction,
    NewOptions, StepOutcome,
};
use wtm_core::{
    allocate_worktree, AllocateOptions, CommandOutput, GlobalConfig, ProcessRunner, StatePaths,
    WtmError,
};

const WEB_SPEC: &str = "HTTP_PORT:\n  port_range: \"8000..\"\nVITE_PORT:\n  port_range: \"5173..\"\n";

/// Scripted stand-in for git and docker
///
/// - `git rev-parse` succeeds only for known branches
/// - `git worktree add` creates the target directory
/// - `git worktree remove` refuses without --force while `dirty` is set
/// - everything else succeeds
#[derive(Default)]
struct FakeRunner {
    branches: Vec<&'static str>,
    dirty: bool,
    calls: RefCell<Vec<String>>,
}

impl FakeRunner {
    fn with_branches(branches: &[&'static str]) -> Self {
        FakeRunner {
            branches: branches.to_vec(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn ran(&self, line: &str) -> bool {
        self.calls.borrow().iter().any(|call| call == line)
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str], _cwd: &Path) -> wtm_core::Result<CommandOutput> {
        self.calls
            .borrow_mut()
            .push(format!("{} {}", program, args.join(" ")));

        let mut output = CommandOutput::default();
        if program != "git" {
            return Ok(output);
        }

        let target = args.iter().find(|arg| arg.starts_with('/')).map(|arg| PathBuf::from(*arg));
        match args {
            ["rev-parse", .., branch] => {
                if !self.branches.iter().any(|known| known == branch) {
                    output.exit_code = 1;
                }
            }
            ["worktree", "add", ..] => {
                if let Some(target) = target {
                    fs::create_dir_all(target)?;
                }
            }
            ["worktree", "remove", ..] => {
                if self.dirty && !args.contains(&"--force") {
                    output.exit_code = 128;
                    output.stderr = "fatal: contains modified or untracked files, use --force to delete it\n"
                        .to_string();
                } else if let Some(target) = target {
                    fs::remove_dir_all(target)?;
                }
            }
            ["status", "--short"] => output.stdout = " M app/Http/Kernel.php\n?? notes.txt\n".to_string(),
            _ => {}
        }
        Ok(output)
    }
}

/// Main checkout `<temp>/projects/shop` with a .git dir and .worktree.yml
fn main_checkout(temp_dir: &TempDir) -> PathBuf {
    let main = temp_dir.path().join("projects").join("shop");
    fs::create_dir_all(main.join(".git")).unwrap();
    fs::write(main.join(".worktree.yml"), WEB_SPEC).unwrap();
    main
}

fn state(temp_dir: &TempDir) -> StatePaths {
    StatePaths::new(temp_dir.path().join("state"))
}

// ==================== new ====================

#[test]
fn test_new_creates_sibling_and_allocates() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let main = main_checkout(&temp_dir);
    let runner = FakeRunner::with_branches(&["main"]);

    let outcome = create_worktree(&paths, &main, &NewOptions::default(), &runner).unwrap();

    assert_eq!(outcome.name, "shop-2");
    assert_eq!(outcome.path, temp_dir.path().join("projects").join("shop-2"));
    assert!(runner.ran(&format!(
        "git worktree add --detach {} main",
        outcome.path.display()
    )));

    // .worktree.yml is not committed yet, so the main checkout's copy is used
    assert_eq!(outcome.allocation.ports.get("HTTP_PORT"), Some(8000));
    assert_eq!(
        fs::read_to_string(outcome.path.join(ENV_FILE)).unwrap(),
        "HTTP_PORT=8000\nVITE_PORT=5173\n"
    );
    assert!(outcome.install.is_none());
}

#[test]
fn test_new_numbers_past_existing_siblings() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let main = main_checkout(&temp_dir);
    let runner = FakeRunner::with_branches(&["main"]);

    let first = create_worktree(&paths, &main, &NewOptions::default(), &runner).unwrap();
    let second = create_worktree(&paths, &main, &NewOptions::default(), &runner).unwrap();

    assert_eq!(first.name, "shop-2");
    assert_eq!(second.name, "shop-3");
    assert_eq!(second.allocation.ports.get("HTTP_PORT"), Some(8001));
    assert_eq!(second.allocation.ports.get("VITE_PORT"), Some(5174));
}

#[test]
fn test_new_with_new_branch() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let main = main_checkout(&temp_dir);
    let runner = FakeRunner::with_branches(&["main"]);
    let options = NewOptions {
        branch: Some("feature-login".to_string()),
        ..Default::default()
    };

    let outcome = create_worktree(&paths, &main, &options, &runner).unwrap();

    assert!(runner.ran(&format!(
        "git worktree add -b feature-login {} main",
        outcome.path.display()
    )));
}

#[test]
fn test_new_with_missing_base_touches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let main = main_checkout(&temp_dir);
    let runner = FakeRunner::with_branches(&["main"]);
    let options = NewOptions {
        base: "develop".to_string(),
        ..Default::default()
    };

    let err = create_worktree(&paths, &main, &options, &runner).unwrap_err();

    assert!(matches!(err, WtmError::BranchNotFound(ref b) if b == "develop"));
    assert!(!temp_dir.path().join("projects").join("shop-2").exists());
    assert!(!paths.allocations_file().exists());
}

#[test]
fn test_new_outside_repository() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let dir = temp_dir.path().join("plain");
    fs::create_dir_all(&dir).unwrap();
    let runner = FakeRunner::with_branches(&["main"]);

    let err = create_worktree(&paths, &dir, &NewOptions::default(), &runner).unwrap_err();

    assert!(matches!(err, WtmError::NotAGitRepository(_)));
    assert!(runner.calls().is_empty());
}

// ==================== remove ====================

#[test]
fn test_remove_releases_ports() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let main = main_checkout(&temp_dir);
    let runner = FakeRunner::with_branches(&["main"]);
    let created = create_worktree(&paths, &main, &NewOptions::default(), &runner).unwrap();
    fs::write(created.path.join("compose.yaml"), "services: {}\n").unwrap();

    let outcome = remove_worktree(&paths, &main, "2", false, &runner).unwrap();

    assert_eq!(outcome.name, "shop-2");
    assert_eq!(outcome.released, Some(created.allocation.ports));
    assert!(outcome.warnings.is_empty());
    assert!(runner.ran("docker compose down -v"));
    assert!(!created.path.exists());
    assert!(paths.store().load().unwrap().worktree("shop-2").is_none());
}

#[test]
fn test_remove_dirty_worktree_needs_force() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let main = main_checkout(&temp_dir);
    let mut runner = FakeRunner::with_branches(&["main"]);
    let created = create_worktree(&paths, &main, &NewOptions::default(), &runner).unwrap();
    runner.dirty = true;

    // 1. Refused, allocation kept
    let err = remove_worktree(&paths, &main, "2", false, &runner).unwrap_err();
    match &err {
        WtmError::WorktreeDirty { status, .. } => assert!(status.contains("notes.txt")),
        other => panic!("Expected WorktreeDirty, got {:?}", other),
    }
    assert!(err.hint().unwrap().contains("--force"));
    assert!(created.path.exists());
    assert!(paths.store().load().unwrap().worktree("shop-2").is_some());

    // 2. --force goes through
    let outcome = remove_worktree(&paths, &main, "2", true, &runner).unwrap();
    assert!(outcome.released.is_some());
    assert!(runner.ran(&format!(
        "git worktree remove --force {}",
        created.path.display()
    )));
}

#[test]
fn test_remove_rejects_bad_numbers() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let main = main_checkout(&temp_dir);
    let runner = FakeRunner::with_branches(&["main"]);

    for number in ["0", "-2", "two"] {
        let err = remove_worktree(&paths, &main, number, false, &runner).unwrap_err();
        assert!(matches!(err, WtmError::InvalidWorktreeNumber(_)), "{}", number);
    }

    let err = remove_worktree(&paths, &main, "7", false, &runner).unwrap_err();
    assert!(matches!(err, WtmError::WorktreeNotFound(_)));
    assert!(runner.calls().is_empty());
}

// ==================== scan ====================

#[test]
fn test_scan_rebuilds_table_and_reports_conflicts() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let root = temp_dir.path().join("projects");
    for (name, env) in [
        ("shop", "HTTP_PORT=8000\nVITE_PORT=5173\n"),
        ("blog", "HTTP_PORT=8000\nVITE_PORT=5174\n"),
    ] {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(".worktree.yml"), WEB_SPEC).unwrap();
        fs::write(dir.join(ENV_FILE), env).unwrap();
    }
    add_root(&paths, &root.to_string_lossy()).unwrap();

    let report = scan_roots(&paths, false).unwrap();

    assert_eq!(report.worktrees.len(), 2);
    let holders = report.conflicts.get(&8000).expect("8000 is held twice");
    assert_eq!(holders.len(), 2);
    assert!(report.saved);

    let table = paths.store().load().unwrap();
    assert_eq!(table.worktree("blog").unwrap().get("VITE_PORT"), Some(5174));
}

#[test]
fn test_scan_dry_run_leaves_table() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    main_checkout(&temp_dir);
    add_root(&paths, &temp_dir.path().join("projects").to_string_lossy()).unwrap();

    let report = scan_roots(&paths, true).unwrap();

    // shop has no .env yet; .git is never descended into
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("shop"));
    assert!(report.worktrees.is_empty());
    assert!(!report.saved);
    assert!(!paths.allocations_file().exists());
}

// ==================== reserve-port ====================

#[test]
fn test_reserve_port_moves_only_colliding_variable() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let root = temp_dir.path().join("projects");
    let mut dirs = Vec::new();
    for name in ["shop", "shop-2"] {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(".worktree.yml"), WEB_SPEC).unwrap();
        allocate_worktree(&paths, &dir, &AllocateOptions::default()).unwrap();
        dirs.push(dir);
    }
    add_root(&paths, &root.to_string_lossy()).unwrap();

    let outcome = reserve_port(&paths, 8001).unwrap();

    assert!(!outcome.already_reserved);
    assert_eq!(outcome.evictions.len(), 1);
    match &outcome.evictions[0] {
        Eviction::Reallocated { worktree, outcome, .. } => {
            assert_eq!(worktree, "shop-2");
            assert_eq!(outcome.ports.get("HTTP_PORT"), Some(8002));
            assert_eq!(outcome.ports.get("VITE_PORT"), Some(5174));
        }
        other => panic!("Expected Reallocated, got {:?}", other),
    }
    assert_eq!(
        fs::read_to_string(dirs[1].join(ENV_FILE)).unwrap(),
        "HTTP_PORT=8002\nVITE_PORT=5174\n"
    );
    assert_eq!(
        fs::read_to_string(dirs[0].join(ENV_FILE)).unwrap(),
        "HTTP_PORT=8000\nVITE_PORT=5173\n"
    );
    assert!(GlobalConfig::load(paths.config_file()).unwrap().is_reserved(8001));
}

#[test]
fn test_reserve_port_reports_unlocatable_holder() {
    let temp_dir = TempDir::new().unwrap();
    let paths = state(&temp_dir);
    let dir = temp_dir.path().join("elsewhere").join("shop");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(".worktree.yml"), WEB_SPEC).unwrap();
    allocate_worktree(&paths, &dir, &AllocateOptions::default()).unwrap();

    let outcome = reserve_port(&paths, 8000).unwrap();

    match &outcome.evictions[..] {
        [Eviction::NotFound { worktree, variables }] => {
            assert_eq!(worktree, "shop");
            assert_eq!(variables, &vec!["HTTP_PORT".to_string()]);
        }
        other => panic!("Expected one NotFound, got {:?}", other),
    }
    // still held until the next allocate inside it
    let table = paths.store().load().unwrap();
    assert_eq!(table.worktree("shop").unwrap().get("HTTP_PORT"), Some(8000));
}

// ==================== lifecycle ====================

#[test]
fn test_hooks_take_precedence() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("shop");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(".worktree.yml"),
        "environment:\n  HTTP_PORT:\n    port_range: \"8000..\"\nhooks:\n  install:\n    - composer install\n    - npm ci\n  up: ./bin/up\n",
    )
    .unwrap();
    let runner = FakeRunner::default();

    assert_eq!(lifecycle::install(&dir, &runner).unwrap(), StepOutcome::Hook);
    assert_eq!(lifecycle::up(&dir, &runner).unwrap(), StepOutcome::Hook);
    assert_eq!(lifecycle::down(&dir, &runner).unwrap(), StepOutcome::Compose);

    assert_eq!(
        runner.calls(),
        vec![
            "sh -c composer install".to_string(),
            "sh -c npm ci".to_string(),
            "sh -c ./bin/up".to_string(),
            "docker compose down".to_string(),
        ]
    );
}

#[test]
fn test_migrate_without_hook_or_project_type() {
    let temp_dir = TempDir::new().unwrap();
    let runner = FakeRunner::default();

    let err = lifecycle::migrate(temp_dir.path(), &runner).unwrap_err();

    assert!(matches!(err, WtmError::UnknownProjectType { ref action } if action == "migrate"));
    assert!(err.hint().unwrap().contains(".worktree/hooks/migrate"));
    assert!(runner.calls().is_empty());
}
