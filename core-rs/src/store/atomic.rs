//! Atomic file replacement
//!
//! Content goes to a temp file in the destination directory which is then
//! renamed over the target. The rename is the only commit point; on any
//! earlier error the temp file is dropped (and deleted) and the target keeps
//! its previous contents.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::errors::Result;

/// Replace `target` with `data`, creating parent directories as needed
pub fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| e.error)?;

    tracing::debug!(path = %target.display(), bytes = data.len(), "file replaced");
    Ok(())
}
