//! File lock: whole-index mutual exclusion across concurrent host
//! invocations sharing an install directory, backed by `dependencies.lock`.
//!
//! Acquisition is non-blocking: the OS advisory lock (`flock`/`LockFileEx`
//! via `fs2`) either succeeds immediately or reports the lock is held.
//! Because it's an OS-level lock tied to the holding process's open file
//! descriptor, it is automatically released if that process crashes —
//! there's no PID-liveness bookkeeping to get wrong.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::HostError;

pub const LOCK_FILE_NAME: &str = "dependencies.lock";

pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Attempts to acquire the lock at `<install_dir>/dependencies.lock`
    /// without blocking. Returns [`HostError::LockBusy`] if another process
    /// already holds it.
    pub fn acquire(install_dir: &Path) -> Result<FileLock, HostError> {
        let path = install_dir.join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| {
                HostError::FilesystemError(format!("opening lock file {}: {e}", path.display()))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(HostError::LockBusy(format!(
                    "{} is held by another process",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(HostError::FilesystemError(format!(
                    "locking {}: {e}",
                    path.display()
                )))
            }
        }

        let mut previous_owner = String::new();
        let _ = file.read_to_string(&mut previous_owner);
        let pid = std::process::id();
        let previous_owner = previous_owner.trim();
        if !previous_owner.is_empty() && previous_owner != pid.to_string() {
            crate::log::debug(format!(
                "reclaimed stale lock {} previously held by pid {previous_owner}",
                path.display()
            ));
        }

        file.set_len(0).map_err(|e| {
            HostError::FilesystemError(format!("truncating lock file {}: {e}", path.display()))
        })?;
        file.seek(SeekFrom::Start(0)).map_err(|e| {
            HostError::FilesystemError(format!("seeking lock file {}: {e}", path.display()))
        })?;
        write!(file, "{pid}").map_err(|e| {
            HostError::FilesystemError(format!(
                "recording owner pid in {}: {e}",
                path.display()
            ))
        })?;

        Ok(FileLock { file, path })
    }

    /// Releases the lock. Idempotent: unlocking an already-unlocked file
    /// descriptor is not an error at the OS level.
    pub fn release(self) {
        if let Err(e) = self.file.unlock() {
            crate::log::debug(format!(
                "releasing lock {} reported: {e}",
                self.path.display()
            ));
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
