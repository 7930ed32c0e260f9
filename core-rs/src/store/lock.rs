//! Advisory lock around the allocation table's load → save span
//!
//! Two allocate runs in different terminals would otherwise race on the
//! load-modify-rename cycle and the later rename would silently win.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// Exclusive lock on a sentinel file; released when dropped
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Block until the exclusive lock on `path` is held
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            // LOCK_EX blocks until every other holder has released
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }

        tracing::debug!(path = %path.display(), "state lock acquired");

        Ok(StateLock {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }

        tracing::debug!(path = %self.path.display(), "state lock released");
    }
}
