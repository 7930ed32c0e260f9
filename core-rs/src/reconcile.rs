/**
 * reconcile.rs
 * Converges one worktree's allocations with its declared variables
 *
 * Phases: Loaded → Diffed → Reconciled, then Persisted by the caller.
 *
 * 1. Refresh: for each declared variable a valid `.env` port replaces the
 *    table value, unless another worktree, a reservation or an earlier
 *    variable of this worktree already holds it. A table port that is now
 *    reserved, or that an earlier worktree in table order also holds, is
 *    dropped and reallocated.
 * 2. Diff: new = declared − held, removed = table record − declared.
 * 3. Allocate new variables against other worktrees ∪ reservations ∪ held.
 * 4. Apply overrides for already-held variables against other worktrees ∪
 *    reservations only, so a worktree may swap its own ports. The result
 *    must not hold one port twice.
 *
 * Only the in-memory table is touched, and only on success.
 */

use std::collections::HashSet;

use crate::envfile::{port_value, EnvVars};
use crate::errors::{Result, WtmError};
use crate::port::{range::in_bounds, Allocator, VariableSpec};
use crate::project::GlobalConfig;
use crate::store::{AllocationTable, PortMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loaded,
    Diffed,
    Reconciled,
    Persisted,
}

/// One variable moving to a different port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortChange {
    pub variable: String,
    pub from: Option<u16>,
    pub to: u16,
}

/// Outcome of reconciling one worktree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub worktree: String,
    pub phase: Phase,
    /// Final mapping in declaration order
    pub ports: PortMap,
    pub added: PortMap,
    pub removed: PortMap,
    /// Manual overrides applied to already-held variables
    pub updated: Vec<PortChange>,
    /// Held values taken over from `.env`
    pub refreshed: Vec<PortChange>,
    /// Override variables not declared in .worktree.yml
    pub ignored_overrides: Vec<String>,
    pub table_changed: bool,
    /// `.env` does not carry the final mapping
    pub env_stale: bool,
}

impl Reconciliation {
    pub fn needs_persist(&self) -> bool {
        self.table_changed || self.env_stale
    }

    pub fn is_noop(&self) -> bool {
        !self.needs_persist()
    }
}

/// Inputs for one worktree
#[derive(Debug, Clone, Copy)]
pub struct Request<'r> {
    pub worktree: &'r str,
    pub specs: &'r [VariableSpec],
    pub env: Option<&'r EnvVars>,
    pub overrides: &'r [(String, u16)],
    pub evict: &'r [String],
}

impl<'r> Request<'r> {
    pub fn new(worktree: &'r str, specs: &'r [VariableSpec]) -> Self {
        Request {
            worktree,
            specs,
            env: None,
            overrides: &[],
            evict: &[],
        }
    }

    /// Current `.env` contents of the worktree, if the file exists
    pub fn env(mut self, env: Option<&'r EnvVars>) -> Self {
        self.env = env;
        self
    }

    pub fn overrides(mut self, overrides: &'r [(String, u16)]) -> Self {
        self.overrides = overrides;
        self
    }

    /// Variables whose held port is discarded and reallocated
    pub fn evict(mut self, evict: &'r [String]) -> Self {
        self.evict = evict;
        self
    }
}

/// Reconciler over explicitly loaded state
pub struct Reconciler<'a> {
    table: &'a mut AllocationTable,
    reserved: HashSet<u16>,
    probe: Option<fn(u16) -> bool>,
}

impl<'a> Reconciler<'a> {
    pub fn new(table: &'a mut AllocationTable, global: &GlobalConfig) -> Self {
        Reconciler {
            table,
            reserved: global.reserved_set(),
            probe: None,
        }
    }

    /// Skip ports the probe rejects when scanning ranges
    pub fn with_probe(mut self, probe: fn(u16) -> bool) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn reconcile(&mut self, request: &Request<'_>) -> Result<Reconciliation> {
        let name = request.worktree;
        let specs = request.specs;
        let prior = self.table.worktree(name).cloned().unwrap_or_default();

        let mut taken = self.table.ports_excluding(name);
        taken.extend(self.reserved.iter().copied());

        tracing::debug!(
            phase = ?Phase::Loaded,
            worktree = name,
            declared = specs.len(),
            held = prior.len(),
            env = request.env.is_some(),
            "reconciling"
        );

        let (held, refreshed) = self.refresh(request, &prior, &taken);

        let declared = |variable: &str| specs.iter().any(|spec| spec.name == variable);
        let removed: PortMap = prior
            .iter()
            .filter(|(variable, _)| !declared(variable))
            .map(|(variable, port)| (variable.to_string(), port))
            .collect();
        let new_specs: Vec<VariableSpec> = specs
            .iter()
            .filter(|spec| !held.contains_key(&spec.name))
            .cloned()
            .collect();

        tracing::debug!(
            phase = ?Phase::Diffed,
            worktree = name,
            new = new_specs.len(),
            removed = removed.len(),
            refreshed = refreshed.len(),
            overrides = request.overrides.len(),
            "diffed"
        );

        let added = if new_specs.is_empty() {
            PortMap::new()
        } else {
            let mut used = taken.clone();
            used.extend(held.ports());
            let mut allocator = Allocator::new(used);
            if let Some(probe) = self.probe {
                allocator = allocator.with_probe(probe);
            }
            allocator.allocate(&new_specs, request.overrides)?
        };

        let mut ports = PortMap::new();
        for spec in specs {
            if let Some(port) = held.get(&spec.name).or_else(|| added.get(&spec.name)) {
                ports.insert(spec.name.clone(), port);
            }
        }

        let mut updated = Vec::new();
        let mut ignored_overrides = Vec::new();
        for (variable, port) in request.overrides {
            if !declared(variable) {
                tracing::warn!(worktree = name, variable = %variable, "override names an undeclared variable");
                ignored_overrides.push(variable.clone());
                continue;
            }
            if added.contains_key(variable) {
                continue;
            }

            let current = ports.get(variable);
            if current == Some(*port) {
                continue;
            }
            if taken.contains(port) {
                return Err(WtmError::PortConflict {
                    port: *port,
                    variable: variable.clone(),
                });
            }

            ports.insert(variable.clone(), *port);
            updated.push(PortChange {
                variable: variable.clone(),
                from: current,
                to: *port,
            });
        }

        for change in &updated {
            let shared = ports
                .iter()
                .any(|(variable, port)| port == change.to && variable != change.variable);
            if shared {
                return Err(WtmError::PortConflict {
                    port: change.to,
                    variable: change.variable.clone(),
                });
            }
        }
        if let Some((variable, port)) = ports.first_duplicate() {
            return Err(WtmError::PortConflict {
                port,
                variable: variable.to_string(),
            });
        }

        let table_changed = ports != prior;
        let env_stale = match request.env {
            None => !ports.is_empty(),
            Some(vars) => {
                ports
                    .iter()
                    .any(|(variable, port)| vars.get(variable).and_then(|v| port_value(v)) != Some(port))
                    || removed.keys().any(|variable| vars.contains_key(variable))
            }
        };

        if table_changed {
            self.table.set_worktree(name, ports.clone());
        }

        tracing::debug!(
            phase = ?Phase::Reconciled,
            worktree = name,
            table_changed,
            env_stale,
            "reconciled"
        );

        Ok(Reconciliation {
            worktree: name.to_string(),
            phase: Phase::Reconciled,
            ports,
            added,
            removed,
            updated,
            refreshed,
            ignored_overrides,
            table_changed,
            env_stale,
        })
    }

    /// Held ports for still-declared variables, with `.env` drift applied
    fn refresh(
        &self,
        request: &Request<'_>,
        prior: &PortMap,
        taken: &HashSet<u16>,
    ) -> (PortMap, Vec<PortChange>) {
        let mut held = PortMap::new();
        let mut refreshed = Vec::new();

        for spec in request.specs {
            if request.evict.iter().any(|variable| *variable == spec.name) {
                continue;
            }

            let table_port = prior.get(&spec.name);
            let env_port = request
                .env
                .and_then(|vars| vars.get(&spec.name))
                .and_then(|value| port_value(value))
                .filter(|port| in_bounds(u64::from(*port)));

            if let Some(port) = env_port.filter(|port| Some(*port) != table_port) {
                if !taken.contains(&port) && !held.ports().any(|p| p == port) {
                    refreshed.push(PortChange {
                        variable: spec.name.clone(),
                        from: table_port,
                        to: port,
                    });
                    held.insert(spec.name.clone(), port);
                    continue;
                }
                tracing::warn!(
                    worktree = request.worktree,
                    variable = %spec.name,
                    port,
                    ".env port is held elsewhere; keeping the table value"
                );
            }

            // A table port already taken by a refreshed sibling is reallocated
            if let Some(port) = table_port.filter(|port| !held.ports().any(|p| p == *port)) {
                if self.keeps(request.worktree, port) {
                    held.insert(spec.name.clone(), port);
                } else {
                    tracing::warn!(
                        worktree = request.worktree,
                        variable = %spec.name,
                        port,
                        "held port is reserved or belongs to an earlier worktree; reallocating"
                    );
                }
            }
        }

        (held, refreshed)
    }

    /// Whether `worktree` may keep a port its table record already holds.
    ///
    /// Reserved ports are never kept. A port shared with other worktrees
    /// stays with the first holder in table order; later holders move.
    fn keeps(&self, worktree: &str, port: u16) -> bool {
        if self.reserved.contains(&port) {
            return false;
        }
        self.table
            .holders(port)
            .first()
            .map_or(true, |holder| holder.worktree == worktree)
    }
}
