/**
 * global.rs
 * User-level configuration (config.yml)
 *
 * Format:
 * ```yaml
 * reserved_ports:
 *   - 3306
 *   - "5000-5010"
 * roots:
 *   - ~/projects
 * ```
 *
 * Both keys are optional. Unparseable reservation entries are kept on
 * disk but reserve nothing.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::errors::{Result, WtmError};
use crate::port::{expand_reserved, ReservedPort};
use crate::store::atomic_write;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub reserved_ports: Vec<ReservedPort>,
    #[serde(default)]
    pub roots: Vec<String>,
}

impl GlobalConfig {
    /// Load config.yml; a missing or empty file is the default config
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| {
            WtmError::ConfigInvalid(format!("Invalid YAML in {}: {}", path.display(), e))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        atomic_write(path.as_ref(), yaml.as_bytes())
    }

    /// Every reserved port, ranges expanded
    pub fn reserved_set(&self) -> HashSet<u16> {
        expand_reserved(&self.reserved_ports)
    }

    pub fn is_reserved(&self, port: u16) -> bool {
        self.reserved_ports.iter().any(|entry| entry.ports().contains(&port))
    }

    /// Append `port` unless it is already listed on its own; returns whether
    /// it was added. A port covered only by a range entry is still appended.
    pub fn reserve(&mut self, port: u16) -> bool {
        if self.reserved_ports.iter().any(|entry| entry.is_single(port)) {
            return false;
        }
        self.reserved_ports.push(ReservedPort::Port(i64::from(port)));
        true
    }

    /// Register a root; returns false if it was already present
    pub fn add_root(&mut self, root: &str) -> bool {
        if self.roots.iter().any(|r| r == root) {
            return false;
        }
        self.roots.push(root.to_string());
        true
    }

    /// Unregister a root; returns false if it was not present
    pub fn remove_root(&mut self, root: &str) -> bool {
        let before = self.roots.len();
        self.roots.retain(|r| r != root);
        self.roots.len() != before
    }
}
