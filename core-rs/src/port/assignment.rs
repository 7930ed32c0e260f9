/**
 * assignment.rs
 * Manual port override tokens: VAR_NAME=PORT
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{Result, WtmError};
use crate::port::range::in_bounds;

static ASSIGNMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z_][A-Z0-9_]*)=(\d+)$").expect("assignment pattern is valid")
});

/// Ordered list of operator-supplied overrides
pub type Overrides = Vec<(String, u16)>;

/// Parse a single `VAR=PORT` token
pub fn parse_assignment(token: &str) -> Result<(String, u16)> {
    let caps = ASSIGNMENT_RE
        .captures(token)
        .ok_or_else(|| WtmError::InvalidAssignmentFormat(token.to_string()))?;

    let variable = caps[1].to_string();
    let port: u64 = caps[2].parse().unwrap_or(u64::MAX);

    if !in_bounds(port) {
        return Err(WtmError::PortOutOfBounds { variable, port });
    }

    Ok((variable, port as u16))
}

/// Parse all tokens; a later token for the same variable replaces the earlier one
pub fn parse_assignments<S: AsRef<str>>(tokens: &[S]) -> Result<Overrides> {
    let mut overrides: Overrides = Vec::with_capacity(tokens.len());

    for token in tokens {
        let (variable, port) = parse_assignment(token.as_ref())?;
        match overrides.iter_mut().find(|(name, _)| *name == variable) {
            Some(existing) => existing.1 = port,
            None => overrides.push((variable, port)),
        }
    }

    Ok(overrides)
}
