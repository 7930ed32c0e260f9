/**
 * reservation.rs
 * Global reserved-port list expansion
 *
 * Items in `reserved_ports` (config.yml) may be:
 * - a bare integer:         3306
 * - a numeric string:       "6379"
 * - an inclusive range:     "5000-5010"
 *
 * The file is hand-edited, so anything else is skipped rather than rejected.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One entry of the global `reserved_ports` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReservedPort {
    Port(i64),
    Text(String),
    /// Anything else the user typed; preserved on save, ignored on expansion
    Other(serde_yaml::Value),
}

impl ReservedPort {
    /// Ports covered by this entry (empty when malformed)
    pub fn ports(&self) -> Vec<u16> {
        match self {
            ReservedPort::Port(port) => u16::try_from(*port).into_iter().collect(),
            ReservedPort::Text(text) => expand_text(text.trim()),
            ReservedPort::Other(_) => Vec::new(),
        }
    }

    /// True when this entry reserves exactly `port` as a single value
    pub fn is_single(&self, port: u16) -> bool {
        match self {
            ReservedPort::Port(p) => *p == i64::from(port),
            ReservedPort::Text(text) => text.trim().parse::<u16>().ok() == Some(port),
            ReservedPort::Other(_) => false,
        }
    }
}

fn expand_text(text: &str) -> Vec<u16> {
    if text.contains('-') {
        let parts: Vec<&str> = text.split('-').collect();
        if parts.len() != 2 {
            return Vec::new();
        }
        return match (parts[0].trim().parse::<u16>(), parts[1].trim().parse::<u16>()) {
            (Ok(start), Ok(end)) if start <= end => (start..=end).collect(),
            _ => Vec::new(),
        };
    }

    text.parse::<u16>().into_iter().collect()
}

/// Flatten the reserved list into a membership set
pub fn expand_reserved(items: &[ReservedPort]) -> HashSet<u16> {
    items.iter().flat_map(ReservedPort::ports).collect()
}
