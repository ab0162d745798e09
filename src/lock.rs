//! Single-writer guard for the update pipeline.
//!
//! Two updates racing on the same archive and output directory could publish
//! interleaved files, so `update` holds an exclusive lock file for its whole
//! run. The file is created with O_CREAT|O_EXCL and removed on drop. A lock
//! left behind by a process that no longer exists is reclaimed.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::export;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub started_at: String,
}

impl LockMetadata {
    /// True when the recorded holder is no longer running on this host.
    pub fn is_stale(&self) -> bool {
        self.pid != 0 && !is_process_running(self.pid)
    }
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // kill(pid, 0) checks without signalling; EPERM means it exists under
    // another user.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

#[derive(Debug)]
pub struct UpdateLock {
    _file: File,
    path: PathBuf,
}

impl UpdateLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let metadata = LockMetadata {
                    pid: std::process::id(),
                    started_at: export::local_now().to_rfc3339(),
                };
                file.write_all(&serde_json::to_vec(&metadata)?)?;
                file.sync_all()?;
                tracing::debug!(path = %path.display(), "update lock acquired");
                Ok(UpdateLock {
                    _file: file,
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read(path)
                    .ok()
                    .and_then(|bytes| serde_json::from_slice::<LockMetadata>(&bytes).ok());
                if let Some(holder) = holder.as_ref().filter(|h| h.is_stale()) {
                    tracing::warn!(
                        path = %path.display(),
                        pid = holder.pid,
                        started_at = %holder.started_at,
                        "removing stale update lock from terminated process"
                    );
                    if fs::remove_file(path).is_ok() {
                        return Self::acquire(path);
                    }
                }
                let (pid, started_at) = match holder {
                    Some(holder) => (holder.pid, holder.started_at),
                    None => (0, "unknown".to_string()),
                };
                Err(Error::AlreadyLocked {
                    path: path.to_path_buf(),
                    pid,
                    started_at,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove update lock");
        }
    }
}
