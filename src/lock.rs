//! Run-level mutual exclusion.
//!
//! Only one run may touch a given store at a time. The lock is a file created
//! with `create_new`, holding the owner's pid and start time; it is removed
//! when the [`RunLock`] is dropped, including on early return via `?`.

use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `path`, failing if another run holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(path).unwrap_or_default();
                bail!(
                    "Another run holds the lock at {} ({}). If no run is active, remove the file.",
                    path.display(),
                    holder.trim()
                );
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create lock file: {}", path.display()))
            }
        };

        // Built before stamping so a failed write still removes the file.
        let lock = Self {
            path: path.to_path_buf(),
        };
        lock.stamp(&mut file)?;
        debug!(path = %path.display(), "run lock acquired");
        Ok(lock)
    }

    fn stamp(&self, out: &mut impl Write) -> Result<()> {
        writeln!(
            out,
            "pid={} started={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )
        .with_context(|| format!("Failed to write lock file: {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("run.lock");

        let first = RunLock::acquire(&path).unwrap();
        let err = RunLock::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("Another run holds the lock"));

        drop(first);
        assert!(!path.exists());
        let again = RunLock::acquire(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_stamp_leaves_no_stale_lock() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("run.lock");
        std::fs::write(&path, "").unwrap();

        let result = {
            let lock = RunLock { path: path.clone() };
            lock.stamp(&mut BrokenWriter).map(|_| lock)
        };
        assert!(result.is_err());
        assert!(!path.exists());
        RunLock::acquire(&path).unwrap();
    }

    #[test]
    fn lock_file_records_pid() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("run.lock");
        let _lock = RunLock::acquire(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(&format!("pid={}", std::process::id())));
    }
}
