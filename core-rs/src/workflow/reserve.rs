/**
 * reserve.rs
 * Reserve a port globally and move any worktree currently holding it
 *
 * Only the colliding variable is reallocated; the worktree's other ports
 * stay put. Worktrees are located as `<root>/<name>` under the registered
 * roots; ones that cannot be found are reported and keep the port until
 * the next `scan` or `allocate` inside them.
 */

use std::path::PathBuf;

use crate::errors::{Result, WtmError};
use crate::port::range::in_bounds;
use crate::project::{GlobalConfig, StatePaths};
use crate::reconcile::Reconciliation;
use crate::store::StateLock;
use crate::workflow::allocate::{allocate_worktree, AllocateOptions};
use crate::workflow::roots::locate_worktree;

/// What happened to one worktree that held the reserved port
#[derive(Debug)]
pub enum Eviction {
    Reallocated {
        worktree: String,
        path: PathBuf,
        outcome: Reconciliation,
    },
    NotFound {
        worktree: String,
        variables: Vec<String>,
    },
    Failed {
        worktree: String,
        path: PathBuf,
        error: WtmError,
    },
}

#[derive(Debug)]
pub struct ReserveOutcome {
    pub port: u16,
    pub already_reserved: bool,
    pub evictions: Vec<Eviction>,
}

pub fn reserve_port(paths: &StatePaths, port: u64) -> Result<ReserveOutcome> {
    if !in_bounds(port) {
        return Err(WtmError::PortOutOfBounds {
            variable: "reserved port".to_string(),
            port,
        });
    }
    let port = port as u16;

    // worktree → variables holding the port, in table order
    let mut holders: Vec<(String, Vec<String>)> = Vec::new();
    let roots = {
        let _lock = StateLock::acquire(&paths.lock_file())?;
        let mut config = GlobalConfig::load(paths.config_file())?;
        if !config.reserve(port) {
            return Ok(ReserveOutcome {
                port,
                already_reserved: true,
                evictions: Vec::new(),
            });
        }
        config.save(paths.config_file())?;
        tracing::info!(port, "port reserved");

        for holder in paths.store().load()?.holders(port) {
            match holders.iter_mut().find(|(worktree, _)| *worktree == holder.worktree) {
                Some((_, variables)) => variables.push(holder.variable),
                None => holders.push((holder.worktree, vec![holder.variable])),
            }
        }
        config.roots
    };

    let mut evictions = Vec::with_capacity(holders.len());
    for (worktree, variables) in holders {
        let Some(path) = locate_worktree(&roots, &worktree) else {
            tracing::warn!(worktree = %worktree, port, "holder of reserved port not found under roots");
            evictions.push(Eviction::NotFound {
                worktree,
                variables,
            });
            continue;
        };

        let options = AllocateOptions {
            evict: variables,
            ..Default::default()
        };
        evictions.push(match allocate_worktree(paths, &path, &options) {
            Ok(outcome) => Eviction::Reallocated {
                worktree,
                path,
                outcome,
            },
            Err(error) => Eviction::Failed {
                worktree,
                path,
                error,
            },
        });
    }

    Ok(ReserveOutcome {
        port,
        already_reserved: false,
        evictions,
    })
}
