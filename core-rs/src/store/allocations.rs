/**
 * allocations.rs
 * Global allocation table (allocations.json)
 *
 * Format:
 * ```json
 * {
 *     "allocations": {
 *         "shop-2": { "HTTP_PORT": 8001, "VITE_PORT": 5174 },
 *         "shop-3": { "HTTP_PORT": 8002, "VITE_PORT": 5175 }
 *     }
 * }
 * ```
 *
 * Invariant: no port appears twice across the whole table.
 */

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, WtmError};
use crate::store::atomic::atomic_write;
use crate::store::port_map::PortMap;

/// worktree name → allocations of that worktree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationTable {
    #[serde(default, deserialize_with = "deserialize_worktrees")]
    allocations: BTreeMap<String, PortMap>,
}

/// A (worktree, variable) pair holding some port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holder {
    pub worktree: String,
    pub variable: String,
}

impl AllocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn worktree(&self, name: &str) -> Option<&PortMap> {
        self.allocations.get(name)
    }

    /// Replace one worktree's record; an empty map drops the worktree
    pub fn set_worktree(&mut self, name: &str, ports: PortMap) {
        if ports.is_empty() {
            self.allocations.remove(name);
        } else {
            self.allocations.insert(name.to_string(), ports);
        }
    }

    pub fn remove_worktree(&mut self, name: &str) -> Option<PortMap> {
        self.allocations.remove(name)
    }

    /// Worktrees in name order
    pub fn worktrees(&self) -> impl Iterator<Item = (&str, &PortMap)> + '_ {
        self.allocations.iter().map(|(name, ports)| (name.as_str(), ports))
    }

    /// Every port held by any worktree
    pub fn all_ports(&self) -> HashSet<u16> {
        self.allocations.values().flat_map(PortMap::ports).collect()
    }

    /// Every port held by worktrees other than `name`
    pub fn ports_excluding(&self, name: &str) -> HashSet<u16> {
        self.allocations
            .iter()
            .filter(|(worktree, _)| worktree.as_str() != name)
            .flat_map(|(_, ports)| ports.ports())
            .collect()
    }

    /// Who holds `port`
    pub fn holders(&self, port: u16) -> Vec<Holder> {
        self.allocations
            .iter()
            .flat_map(|(worktree, ports)| {
                ports
                    .iter()
                    .filter(move |(_, p)| *p == port)
                    .map(move |(variable, _)| Holder {
                        worktree: worktree.clone(),
                        variable: variable.to_string(),
                    })
            })
            .collect()
    }

    /// Ports held by more than one (worktree, variable) pair
    pub fn conflicts(&self) -> BTreeMap<u16, Vec<Holder>> {
        let mut usage: BTreeMap<u16, Vec<Holder>> = BTreeMap::new();
        for (worktree, ports) in &self.allocations {
            for (variable, port) in ports.iter() {
                usage.entry(port).or_default().push(Holder {
                    worktree: worktree.clone(),
                    variable: variable.to_string(),
                });
            }
        }
        usage.retain(|_, holders| holders.len() > 1);
        usage
    }

    /// (port, worktree, variable) rows sorted by port
    pub fn rows_by_port(&self) -> Vec<(u16, &str, &str)> {
        let mut rows: Vec<(u16, &str, &str)> = self
            .allocations
            .iter()
            .flat_map(|(worktree, ports)| {
                ports
                    .iter()
                    .map(move |(variable, port)| (port, worktree.as_str(), variable))
            })
            .collect();
        rows.sort();
        rows
    }
}

fn deserialize_worktrees<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, PortMap>, D::Error>
where
    D: Deserializer<'de>,
{
    // An empty table may have been written as `[]`
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Worktrees {
        Map(BTreeMap<String, PortMap>),
        Empty([(); 0]),
    }

    Ok(match Worktrees::deserialize(deserializer)? {
        Worktrees::Map(map) => map,
        Worktrees::Empty(_) => BTreeMap::new(),
    })
}

/// Allocation Store - file-backed AllocationTable
#[derive(Debug, Clone)]
pub struct AllocationStore {
    path: PathBuf,
}

impl AllocationStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        AllocationStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the table
    ///
    /// Returns an empty table if the file doesn't exist
    ///
    /// # Errors
    /// `CorruptState` if the file exists but is not a valid table
    pub fn load(&self) -> Result<AllocationTable> {
        if !self.path.exists() {
            return Ok(AllocationTable::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(AllocationTable::new());
        }

        serde_json::from_str(&content).map_err(|e| WtmError::CorruptState {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Save the table (pretty JSON, temp file + rename)
    pub fn save(&self, table: &AllocationTable) -> Result<()> {
        let mut json = serde_json::to_string_pretty(table)?;
        json.push('\n');
        atomic_write(&self.path, json.as_bytes())?;

        tracing::info!(
            path = %self.path.display(),
            worktrees = table.allocations.len(),
            "allocation table saved"
        );
        Ok(())
    }
}
