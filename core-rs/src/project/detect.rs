/**
 * detect.rs
 * Project type detection for install/migrate fallbacks
 *
 * Detection order:
 * - Laravel: `artisan` file + composer.json requiring laravel/framework
 * - Monorepo: one or more immediate subdirectories detect as a leaf type
 *
 * A monorepo installs root-level node dependencies first (when a
 * package.json exists), then each subproject in directory-name order.
 */

use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

use crate::drivers::ProcessRunner;
use crate::errors::{Result, WtmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectKind {
    Laravel { path: PathBuf },
    Monorepo { path: PathBuf, subprojects: Vec<ProjectKind> },
    Unknown,
}

type Detector = fn(&Path) -> Option<ProjectKind>;

/// Leaf detectors, tried in order
const LEAF_DETECTORS: &[Detector] = &[detect_laravel];

impl ProjectKind {
    /// Detect the project type at `path`
    pub fn detect(path: &Path) -> ProjectKind {
        detect_leaf(path)
            .or_else(|| detect_monorepo(path))
            .unwrap_or(ProjectKind::Unknown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProjectKind::Laravel { .. } => "laravel",
            ProjectKind::Monorepo { .. } => "monorepo",
            ProjectKind::Unknown => "unknown",
        }
    }

    pub fn install(&self, runner: &dyn ProcessRunner) -> Result<()> {
        match self {
            ProjectKind::Laravel { path } => {
                run_step(runner, path, "composer", &["install"])?;
                if path.join("package.json").is_file() {
                    run_step(runner, path, "npm", &["install"])?;
                }
                Ok(())
            }
            ProjectKind::Monorepo { path, subprojects } => {
                if path.join("package.json").is_file() {
                    run_step(runner, path, "npm", &["install"])?;
                }
                for subproject in subprojects {
                    subproject.install(runner)?;
                }
                Ok(())
            }
            ProjectKind::Unknown => Err(WtmError::UnknownProjectType {
                action: "install".to_string(),
            }),
        }
    }

    pub fn migrate(&self, runner: &dyn ProcessRunner) -> Result<()> {
        match self {
            ProjectKind::Laravel { path } => {
                run_step(runner, path, "php", &["artisan", "migrate", "--force"])
            }
            ProjectKind::Monorepo { subprojects, .. } => {
                for subproject in subprojects {
                    subproject.migrate(runner)?;
                }
                Ok(())
            }
            ProjectKind::Unknown => Err(WtmError::UnknownProjectType {
                action: "migrate".to_string(),
            }),
        }
    }
}

fn run_step(runner: &dyn ProcessRunner, cwd: &Path, program: &str, args: &[&str]) -> Result<()> {
    let command = format!("{} {}", program, args.join(" "));
    tracing::info!(cwd = %cwd.display(), command = %command, "running project step");
    runner.run(program, args, cwd)?.require_success(&command)?;
    Ok(())
}

fn detect_leaf(path: &Path) -> Option<ProjectKind> {
    LEAF_DETECTORS.iter().find_map(|detector| detector(path))
}

fn detect_laravel(path: &Path) -> Option<ProjectKind> {
    if !path.join("artisan").is_file() {
        return None;
    }

    let composer = fs::read_to_string(path.join("composer.json")).ok()?;
    let manifest: JsonValue = serde_json::from_str(&composer).ok()?;
    manifest.get("require")?.get("laravel/framework")?;

    Some(ProjectKind::Laravel {
        path: path.to_path_buf(),
    })
}

fn detect_monorepo(path: &Path) -> Option<ProjectKind> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(path)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| !n.starts_with('.') && n != "node_modules" && n != "vendor")
        })
        .collect();
    dirs.sort();

    let subprojects: Vec<ProjectKind> = dirs.iter().filter_map(|dir| detect_leaf(dir)).collect();
    if subprojects.is_empty() {
        return None;
    }

    Some(ProjectKind::Monorepo {
        path: path.to_path_buf(),
        subprojects,
    })
}
