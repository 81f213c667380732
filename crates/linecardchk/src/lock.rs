//! Advisory lock serializing runs over the state file
//!
//! The lock is an exclusive `flock` on a sibling `.lock` file, taken
//! non-blocking. It is released when the [`StateLock`] is dropped or the
//! process exits.

use crate::error::{LinecardError, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Held exclusive lock on the state file
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Take the lock at `path`, failing with `StateLocked` if another run holds it
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LinecardError::state_io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| LinecardError::state_io(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result != 0 {
                let errno = std::io::Error::last_os_error();
                if errno.raw_os_error() == Some(libc::EWOULDBLOCK) {
                    return Err(LinecardError::StateLocked {
                        path: path.to_path_buf(),
                    });
                }
                return Err(LinecardError::state_io(path, errno));
            }
        }

        debug!(path = %path.display(), "Acquired state lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

}

impl Drop for StateLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        }
        debug!(path = %self.path.display(), "Released state lock");
    }
}
