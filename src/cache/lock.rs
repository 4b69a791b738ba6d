//! Advisory lock serializing writes to a cache directory.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{Result, ViewError};

const LOCK_FILE: &str = ".lock";

/// Exclusive lock on `<root>/.lock`, released on drop.
///
/// On non-Unix targets the lock file is created but not locked.
#[derive(Debug)]
pub struct CacheLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl CacheLock {
    /// Block until the lock on `root` is held.
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| ViewError::CacheWriteFailure {
                path: path.clone(),
                message: e.to_string(),
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: flock on a descriptor owned by `file`, which outlives the call
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc != 0 {
                return Err(ViewError::CacheWriteFailure {
                    path,
                    message: std::io::Error::last_os_error().to_string(),
                });
            }
        }

        Ok(Self { file })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: same descriptor as in `acquire`, still open
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
    }
}

/// Whether `file_name` is the lock file.
pub fn is_lock_file(file_name: &str) -> bool {
    file_name == LOCK_FILE
}
