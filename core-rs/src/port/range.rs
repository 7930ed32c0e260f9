/**
 * range.rs
 * Port range specification parser
 *
 * Format (the `port_range` value in .worktree.yml):
 * - "8000.."     open-ended, up to 65535
 * - "8000..9000" inclusive on both ends
 *
 * Both bounds must stay within [1024, 65535].
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::errors::{Result, WtmError};

/// Lowest port the manager will ever hand out or accept
pub const MIN_PORT: u16 = 1024;

/// Highest TCP port
pub const MAX_PORT: u16 = 65535;

static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.\.(\d*)$").expect("range pattern is valid"));

/// Inclusive port range for one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: Option<u16>,
}

impl PortRange {
    /// Parse a range specification for `variable`
    ///
    /// # Errors
    /// - `InvalidRangeFormat` if the text is not `<digits>..` or `<digits>..<digits>`
    /// - `InvalidRangeBounds` if start is outside [1024, 65535], or end is
    ///   below start or above 65535
    ///
    /// # Example
    /// ```
    /// use wtm_core::port::PortRange;
    ///
    /// let range = PortRange::parse("8000..", "HTTP_PORT").unwrap();
    /// assert_eq!(range.start, 8000);
    /// assert_eq!(range.end, None);
    /// ```
    pub fn parse(text: &str, variable: &str) -> Result<Self> {
        let caps = RANGE_RE
            .captures(text)
            .ok_or_else(|| WtmError::InvalidRangeFormat {
                variable: variable.to_string(),
                value: text.to_string(),
            })?;

        let bounds_error = |reason: String| WtmError::InvalidRangeBounds {
            variable: variable.to_string(),
            value: text.to_string(),
            reason,
        };

        // Oversized digit strings saturate and then fail the bounds check
        let start: u64 = caps[1].parse().unwrap_or(u64::MAX);
        if start < u64::from(MIN_PORT) || start > u64::from(MAX_PORT) {
            return Err(bounds_error(format!(
                "start must be between {} and {}",
                MIN_PORT, MAX_PORT
            )));
        }

        let end = match &caps[2] {
            "" => None,
            digits => {
                let end: u64 = digits.parse().unwrap_or(u64::MAX);
                if end < start || end > u64::from(MAX_PORT) {
                    return Err(bounds_error(format!(
                        "end must be between {} and {}",
                        start, MAX_PORT
                    )));
                }
                Some(end as u16)
            }
        };

        Ok(PortRange {
            start: start as u16,
            end,
        })
    }

    /// Last port the allocator may scan (65535 for open-ended ranges)
    pub fn upper(&self) -> u16 {
        self.end.unwrap_or(MAX_PORT)
    }

    /// Check if port is within this range
    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.upper()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}..{}", self.start, end),
            None => write!(f, "{}..", self.start),
        }
    }
}

/// True when `port` is inside the manageable [1024, 65535] window
pub fn in_bounds(port: u64) -> bool {
    port >= u64::from(MIN_PORT) && port <= u64::from(MAX_PORT)
}
