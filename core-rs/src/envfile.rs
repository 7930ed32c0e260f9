//! `.env` codec
//!
//! Writing emits one `KEY=PORT` line per allocation in declaration order.
//! Reading is tolerant: the file may be hand-edited or contain unrelated
//! settings, so anything that is not a `KEY=VALUE` line is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::store::{atomic_write, PortMap};

/// Name of the generated environment file inside a worktree
pub const ENV_FILE: &str = ".env";

static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z_][A-Z0-9_]*)=(.*)$").expect("env line pattern is valid"));

/// Raw key/value pairs read from an env file
pub type EnvVars = BTreeMap<String, String>;

/// Parse env file content
pub fn parse(content: &str) -> EnvVars {
    let mut vars = EnvVars::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(caps) = LINE_RE.captures(line) {
            vars.insert(caps[1].to_string(), caps[2].to_string());
        }
    }

    vars
}

/// Read and parse an env file
pub fn read(path: &Path) -> Result<EnvVars> {
    let content = fs::read_to_string(path)?;
    Ok(parse(&content))
}

/// Read an env file if it exists
pub fn read_if_exists(path: &Path) -> Result<Option<EnvVars>> {
    if !path.exists() {
        return Ok(None);
    }
    read(path).map(Some)
}

/// Render allocations as env file content
pub fn render(ports: &PortMap) -> String {
    let mut content = String::new();
    for (variable, port) in ports.iter() {
        content.push_str(&format!("{}={}\n", variable, port));
    }
    content
}

/// Atomically write allocations to `path`
pub fn write(path: &Path, ports: &PortMap) -> Result<()> {
    atomic_write(path, render(ports).as_bytes())
}

/// Interpret an env value as a port, if it is one
pub fn port_value(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok()
}
