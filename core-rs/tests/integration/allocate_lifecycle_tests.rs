//! Allocate Lifecycle Integration Tests
//!
//! Drives `allocate_worktree` end to end against a temporary state
//! directory: .worktree.yml in, allocations.json and .env out.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;
use wtm_core::envfile::ENV_FILE;
use wtm_core::{allocate_worktree, AllocateOptions, Phase, StatePaths, WtmError};

const WEB_SPEC: &str = r#"
HTTP_PORT:
  port_range: "8000.."
VITE_PORT:
  port_range: "5173.."
"#;

fn setup() -> (TempDir, StatePaths) {
    let temp_dir = TempDir::new().unwrap();
    let paths = StatePaths::new(temp_dir.path().join("state"));
    (temp_dir, paths)
}

fn worktree(temp_dir: &TempDir, name: &str, spec: &str) -> PathBuf {
    let dir = temp_dir.path().join("projects").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(".worktree.yml"), spec).unwrap();
    dir
}

fn env_of(dir: &Path) -> String {
    fs::read_to_string(dir.join(ENV_FILE)).unwrap()
}

fn overrides(pairs: &[(&str, u16)]) -> AllocateOptions {
    AllocateOptions {
        overrides: pairs.iter().map(|(v, p)| (v.to_string(), *p)).collect(),
        ..Default::default()
    }
}

#[test]
fn test_fresh_worktree_gets_range_starts() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);

    let outcome = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    assert_eq!(outcome.phase, Phase::Persisted);
    assert_eq!(outcome.ports.get("HTTP_PORT"), Some(8000));
    assert_eq!(outcome.ports.get("VITE_PORT"), Some(5173));
    assert_eq!(outcome.added.len(), 2);
    assert_eq!(env_of(&shop), "HTTP_PORT=8000\nVITE_PORT=5173\n");

    let table = paths.store().load().unwrap();
    assert_eq!(table.worktree("shop"), Some(&outcome.ports));
}

#[test]
fn test_second_worktree_gets_next_ports() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    let shop_2 = worktree(&temp_dir, "shop-2", WEB_SPEC);

    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();
    let outcome = allocate_worktree(&paths, &shop_2, &AllocateOptions::default()).unwrap();

    assert_eq!(outcome.ports.get("HTTP_PORT"), Some(8001));
    assert_eq!(outcome.ports.get("VITE_PORT"), Some(5174));
    assert_eq!(env_of(&shop_2), "HTTP_PORT=8001\nVITE_PORT=5174\n");

    // First worktree untouched
    assert_eq!(env_of(&shop), "HTTP_PORT=8000\nVITE_PORT=5173\n");
}

#[test]
fn test_override_to_free_port_updates_table_and_env() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    let outcome = allocate_worktree(&paths, &shop, &overrides(&[("HTTP_PORT", 9000)])).unwrap();

    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0].from, Some(8000));
    assert_eq!(outcome.updated[0].to, 9000);
    assert_eq!(env_of(&shop), "HTTP_PORT=9000\nVITE_PORT=5173\n");
    let table = paths.store().load().unwrap();
    assert_eq!(table.worktree("shop").unwrap().get("HTTP_PORT"), Some(9000));
}

#[test]
fn test_override_to_foreign_port_writes_nothing() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    let shop_2 = worktree(&temp_dir, "shop-2", WEB_SPEC);
    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();
    allocate_worktree(&paths, &shop_2, &AllocateOptions::default()).unwrap();
    let table_before = fs::read_to_string(paths.allocations_file()).unwrap();

    let err = allocate_worktree(&paths, &shop, &overrides(&[("HTTP_PORT", 8001)])).unwrap_err();

    match err {
        WtmError::PortConflict { port, variable } => {
            assert_eq!(port, 8001);
            assert_eq!(variable, "HTTP_PORT");
        }
        other => panic!("Expected PortConflict, got {:?}", other),
    }
    assert_eq!(fs::read_to_string(paths.allocations_file()).unwrap(), table_before);
    assert_eq!(env_of(&shop), "HTTP_PORT=8000\nVITE_PORT=5173\n");
}

#[test]
fn test_override_swap_within_worktree() {
    let (temp_dir, paths) = setup();
    let spec = "A_PORT:\n  port_range: \"8000..\"\nB_PORT:\n  port_range: \"8000..\"\n";
    let shop = worktree(&temp_dir, "shop", spec);
    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    let outcome =
        allocate_worktree(&paths, &shop, &overrides(&[("A_PORT", 8001), ("B_PORT", 8000)])).unwrap();

    assert_eq!(outcome.ports.get("A_PORT"), Some(8001));
    assert_eq!(outcome.ports.get("B_PORT"), Some(8000));
    assert_eq!(env_of(&shop), "A_PORT=8001\nB_PORT=8000\n");
}

#[test]
fn test_undeclared_override_is_ignored() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);

    let outcome = allocate_worktree(&paths, &shop, &overrides(&[("DB_PORT", 3307)])).unwrap();

    assert_eq!(outcome.ignored_overrides, vec!["DB_PORT".to_string()]);
    assert!(!outcome.ports.contains_key("DB_PORT"));
    assert!(!env_of(&shop).contains("DB_PORT"));
}

#[test]
fn test_removed_variable_is_dropped_and_freed() {
    let (temp_dir, paths) = setup();
    let full = format!("{}REDIS_PORT:\n  port_range: \"6379..\"\n", WEB_SPEC);
    let shop = worktree(&temp_dir, "shop", &full);
    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();
    assert_eq!(env_of(&shop), "HTTP_PORT=8000\nVITE_PORT=5173\nREDIS_PORT=6379\n");

    // 1. Drop VITE_PORT from the declaration
    fs::write(
        shop.join(".worktree.yml"),
        "HTTP_PORT:\n  port_range: \"8000..\"\nREDIS_PORT:\n  port_range: \"6379..\"\n",
    )
    .unwrap();
    let outcome = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    assert_eq!(outcome.removed.get("VITE_PORT"), Some(5173));
    assert_eq!(env_of(&shop), "HTTP_PORT=8000\nREDIS_PORT=6379\n");
    let table = paths.store().load().unwrap();
    assert!(!table.worktree("shop").unwrap().contains_key("VITE_PORT"));

    // 2. The freed port goes to the next worktree
    let shop_2 = worktree(&temp_dir, "shop-2", WEB_SPEC);
    let outcome = allocate_worktree(&paths, &shop_2, &AllocateOptions::default()).unwrap();
    assert_eq!(outcome.ports.get("VITE_PORT"), Some(5173));
    assert_eq!(outcome.ports.get("HTTP_PORT"), Some(8001));
}

#[test]
fn test_rerun_is_idempotent() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    let first = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();
    let table_before = fs::read_to_string(paths.allocations_file()).unwrap();

    let second = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    assert!(second.is_noop());
    assert_eq!(second.phase, Phase::Reconciled);
    assert_eq!(second.ports, first.ports);
    assert!(second.added.is_empty());
    assert_eq!(fs::read_to_string(paths.allocations_file()).unwrap(), table_before);
    assert_eq!(env_of(&shop), "HTTP_PORT=8000\nVITE_PORT=5173\n");
}

#[test]
fn test_unrelated_env_keys_do_not_force_rewrite() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    let edited = "APP_KEY=base64:abc\n# local\nHTTP_PORT=8000\nVITE_PORT=5173\n";
    fs::write(shop.join(ENV_FILE), edited).unwrap();

    let outcome = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();
    assert!(outcome.is_noop());
    assert_eq!(env_of(&shop), edited);
}

#[test]
fn test_hand_edited_env_port_is_adopted() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    fs::write(shop.join(ENV_FILE), "HTTP_PORT=8500\nVITE_PORT=5173\n").unwrap();
    let outcome = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    assert_eq!(outcome.refreshed.len(), 1);
    assert_eq!(outcome.refreshed[0].variable, "HTTP_PORT");
    assert_eq!(outcome.refreshed[0].from, Some(8000));
    assert_eq!(outcome.refreshed[0].to, 8500);
    assert!(outcome.table_changed);

    let table = paths.store().load().unwrap();
    assert_eq!(table.worktree("shop").unwrap().get("HTTP_PORT"), Some(8500));
}

#[test]
fn test_env_port_held_elsewhere_is_rewritten() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    let shop_2 = worktree(&temp_dir, "shop-2", WEB_SPEC);
    allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();
    allocate_worktree(&paths, &shop_2, &AllocateOptions::default()).unwrap();

    // shop-2 copied shop's .env by hand
    fs::write(shop_2.join(ENV_FILE), "HTTP_PORT=8000\nVITE_PORT=5173\n").unwrap();
    let outcome = allocate_worktree(&paths, &shop_2, &AllocateOptions::default()).unwrap();

    assert!(outcome.refreshed.is_empty());
    assert!(!outcome.table_changed);
    assert!(outcome.env_stale);
    assert_eq!(env_of(&shop_2), "HTTP_PORT=8001\nVITE_PORT=5174\n");
}

#[test]
fn test_reserved_ports_are_skipped() {
    let (temp_dir, paths) = setup();
    fs::create_dir_all(paths.dir()).unwrap();
    fs::write(
        paths.config_file(),
        "reserved_ports:\n  - 8000\n  - \"5173-5174\"\nroots: []\n",
    )
    .unwrap();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);

    let outcome = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap();

    assert_eq!(outcome.ports.get("HTTP_PORT"), Some(8001));
    assert_eq!(outcome.ports.get("VITE_PORT"), Some(5175));
}

#[test]
fn test_missing_config_fails() {
    let (temp_dir, paths) = setup();
    let dir = temp_dir.path().join("bare");
    fs::create_dir_all(&dir).unwrap();

    let err = allocate_worktree(&paths, &dir, &AllocateOptions::default()).unwrap_err();

    assert!(matches!(err, WtmError::ConfigNotFound { .. }));
    assert!(err.hint().is_some());
    assert!(!dir.join(ENV_FILE).exists());
}

#[test]
fn test_corrupt_table_writes_nothing() {
    let (temp_dir, paths) = setup();
    let shop = worktree(&temp_dir, "shop", WEB_SPEC);
    fs::create_dir_all(paths.dir()).unwrap();
    fs::write(paths.allocations_file(), "{ not json").unwrap();

    let err = allocate_worktree(&paths, &shop, &AllocateOptions::default()).unwrap_err();

    assert!(matches!(err, WtmError::CorruptState { .. }));
    assert!(!shop.join(ENV_FILE).exists());
    assert_eq!(fs::read_to_string(paths.allocations_file()).unwrap(), "{ not json");
}

#[test]
fn test_concurrent_allocations_stay_disjoint() {
    let (temp_dir, paths) = setup();
    let dirs: Vec<PathBuf> = (1..=4)
        .map(|n| worktree(&temp_dir, &format!("shop-{}", n), WEB_SPEC))
        .collect();

    let handles: Vec<_> = dirs
        .into_iter()
        .map(|dir| {
            let paths = paths.clone();
            thread::spawn(move || allocate_worktree(&paths, &dir, &AllocateOptions::default()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let table = paths.store().load().unwrap();
    assert_eq!(table.worktrees().count(), 4);
    assert!(table.conflicts().is_empty());

    // If this test fails:
    // - The state lock is no longer held across load → save
    // - Later renames overwrite earlier allocations
}
