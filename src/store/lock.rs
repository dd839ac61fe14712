use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, StrideError};

/// Single-writer guard over a data directory.
///
/// The lock file carries the pid of the holding process so a refused
/// second `stride` can say who is in the way. The OS lock goes away with
/// the handle, so a crashed holder never wedges the directory.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            let detail = match holder_pid(path) {
                Some(pid) => format!("{} (held by pid {pid})", path.display()),
                None => path.display().to_string(),
            };
            return Err(StrideError::Locked(detail));
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "data directory locked");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clear the recorded pid and drop the OS lock.
    pub fn release(self) -> Result<()> {
        self.file.set_len(0)?;
        FileExt::unlock(&self.file)?;
        debug!(path = %self.path.display(), "data directory unlocked");
        Ok(())
    }
}

/// Pid recorded by the current holder, if the file names one.
pub fn holder_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
