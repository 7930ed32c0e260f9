/**
 * config.rs
 * Parser for .worktree.yml files (YAML format)
 *
 * Format (flat):
 * ```yaml
 * HTTP_PORT:
 *   port_range: "8000.."
 * VITE_PORT:
 *   port_range: "5173..5273"
 * ```
 *
 * or nested, optionally with hooks:
 * ```yaml
 * environment:
 *   HTTP_PORT:
 *     port_range: "8000.."
 * hooks:
 *   install: composer install
 * ```
 *
 * Variable declaration order is the allocation order.
 */

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

use crate::errors::{Result, WtmError};
use crate::port::{PortRange, VariableSpec};
use crate::project::hooks::Hooks;

/// Per-project configuration file name
pub const WORKTREE_CONFIG_FILE: &str = ".worktree.yml";

/// Parsed .worktree.yml
#[derive(Debug, Clone, PartialEq)]
pub struct WorktreeConfig {
    pub variables: Vec<VariableSpec>,
    pub hooks: Hooks,
}

impl WorktreeConfig {
    /// Load .worktree.yml from a worktree directory
    ///
    /// # Example
    /// ```no_run
    /// use wtm_core::project::WorktreeConfig;
    ///
    /// let config = WorktreeConfig::load_from_dir(".")?;
    /// assert!(!config.variables.is_empty());
    /// # Ok::<(), wtm_core::WtmError>(())
    /// ```
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let path = dir.join(WORKTREE_CONFIG_FILE);

        if !path.is_file() {
            return Err(WtmError::ConfigNotFound {
                file: WORKTREE_CONFIG_FILE.to_string(),
                dir: dir.display().to_string(),
            });
        }

        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    /// Hooks only; a missing file means no hooks
    pub fn load_hooks<P: AsRef<Path>>(dir: P) -> Result<Hooks> {
        let path = dir.as_ref().join(WORKTREE_CONFIG_FILE);
        if !path.is_file() {
            return Ok(Hooks::default());
        }

        let root = parse_root(&fs::read_to_string(&path)?)?;
        parse_hooks(&root)
    }

    /// Parse .worktree.yml content
    pub fn parse(content: &str) -> Result<Self> {
        let root = parse_root(content)?;
        let hooks = parse_hooks(&root)?;

        let environment = match root.get("environment") {
            Some(Value::Mapping(env)) => env.clone(),
            _ => {
                let mut flat = root.clone();
                flat.remove("hooks");
                flat
            }
        };

        if environment.is_empty() {
            return Err(WtmError::ConfigInvalid(format!(
                "{} is empty",
                WORKTREE_CONFIG_FILE
            )));
        }

        let mut variables = Vec::with_capacity(environment.len());
        for (key, value) in &environment {
            let name = key.as_str().ok_or_else(|| {
                WtmError::ConfigInvalid(format!(
                    "Invalid variable name in {}: {:?}",
                    WORKTREE_CONFIG_FILE, key
                ))
            })?;
            variables.push(parse_variable(name, value)?);
        }

        Ok(WorktreeConfig { variables, hooks })
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|spec| spec.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }
}

fn parse_root(content: &str) -> Result<Mapping> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| {
        WtmError::ConfigInvalid(format!(
            "Invalid YAML syntax in {}: {}",
            WORKTREE_CONFIG_FILE, e
        ))
    })?;

    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(WtmError::ConfigInvalid(format!(
            "{} must be a mapping of variable names",
            WORKTREE_CONFIG_FILE
        ))),
    }
}

fn parse_hooks(root: &Mapping) -> Result<Hooks> {
    match root.get("hooks") {
        None | Some(Value::Null) => Ok(Hooks::default()),
        Some(value) => serde_yaml::from_value(value.clone()).map_err(|e| {
            WtmError::ConfigInvalid(format!(
                "Invalid hooks section in {}: {}",
                WORKTREE_CONFIG_FILE, e
            ))
        }),
    }
}

fn parse_variable(name: &str, value: &Value) -> Result<VariableSpec> {
    let range_value = value.get("port_range").ok_or_else(|| {
        WtmError::ConfigInvalid(format!(
            "Invalid configuration for {name}: expected 'port_range' key\n\n\
             Example:\nenvironment:\n  {name}:\n    port_range: \"8000..\""
        ))
    })?;

    let text = match range_value {
        Value::String(text) => text.clone(),
        other => {
            return Err(WtmError::InvalidRangeFormat {
                variable: name.to_string(),
                value: serde_yaml::to_string(other)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
        }
    };

    Ok(VariableSpec::new(name, PortRange::parse(&text, name)?))
}
