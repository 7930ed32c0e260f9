/**
 * allocator.rs
 * Lowest-free-port-first allocation
 *
 * Variables are processed strictly in declaration order. For each one:
 * - a manual override is accepted if the port is not already used
 * - otherwise the range is scanned upwards and the first unused port wins
 * - the chosen port is marked used before the next variable is considered,
 *   so two variables of one call can never collide
 *
 * Example (empty used set):
 * - HTTP_PORT "8000.." → 8000
 * - VITE_PORT "5173.." → 5173
 * Second worktree with the first one's ports used:
 * - HTTP_PORT → 8001, VITE_PORT → 5174
 */

use std::collections::HashSet;

use crate::errors::{Result, WtmError};
use crate::port::range::PortRange;
use crate::store::PortMap;

/// One declared variable and the range it may take a port from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: String,
    pub range: PortRange,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, range: PortRange) -> Self {
        VariableSpec {
            name: name.into(),
            range,
        }
    }
}

/// Allocator over a set of ports that are already taken
pub struct Allocator {
    used: HashSet<u16>,
    probe: Option<Box<dyn Fn(u16) -> bool>>,
}

impl Allocator {
    /// Create an allocator
    ///
    /// # Arguments
    /// * `used` - Ports held by any worktree plus expanded reservations
    pub fn new(used: HashSet<u16>) -> Self {
        Allocator { used, probe: None }
    }

    /// Additionally skip ports for which `probe` returns false while scanning
    ///
    /// Manual overrides are never probed.
    pub fn with_probe(mut self, probe: impl Fn(u16) -> bool + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Ports considered taken, including everything allocated so far
    pub fn used(&self) -> &HashSet<u16> {
        &self.used
    }

    /// Allocate a port for every spec, in order
    ///
    /// # Errors
    /// - `PortConflict` if an override names a used port
    /// - `PortRangeExhausted` if a range has no free port left
    pub fn allocate(
        &mut self,
        specs: &[VariableSpec],
        overrides: &[(String, u16)],
    ) -> Result<PortMap> {
        let mut allocated = PortMap::new();

        for spec in specs {
            let requested = overrides
                .iter()
                .find(|(name, _)| *name == spec.name)
                .map(|(_, port)| *port);

            let port = match requested {
                Some(port) => {
                    if self.used.contains(&port) {
                        return Err(WtmError::PortConflict {
                            port,
                            variable: spec.name.clone(),
                        });
                    }
                    port
                }
                None => self
                    .next_free(&spec.range)
                    .ok_or_else(|| WtmError::PortRangeExhausted {
                        variable: spec.name.clone(),
                        range: spec.range.to_string(),
                    })?,
            };

            tracing::debug!(variable = %spec.name, port, range = %spec.range, "port allocated");
            self.used.insert(port);
            allocated.insert(spec.name.clone(), port);
        }

        Ok(allocated)
    }

    fn next_free(&self, range: &PortRange) -> Option<u16> {
        (range.start..=range.upper()).find(|port| {
            !self.used.contains(port) && self.probe.as_ref().map_or(true, |probe| probe(*port))
        })
    }
}
