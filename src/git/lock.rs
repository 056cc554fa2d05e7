//! git::lock
//!
//! Process-wide lock around credential-helper isolation.
//!
//! # Architecture
//!
//! Credential-helper settings live in machine- and user-level git config,
//! shared by every process. Two credbridge runs that capture and restore the
//! same scopes concurrently would each restore the other's cleared state.
//! This lock serializes the isolation window across processes.
//!
//! # Storage
//!
//! - `~/.credbridge/lock.credential-helpers` - Lock file with an OS-level
//!   exclusive lock
//!
//! # Invariants
//!
//! - The lock is held from before capture until after restore
//! - The lock is released on drop (RAII)

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// Default timeout for lock acquisition (10 seconds).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling interval when waiting for the lock (100ms).
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors acquiring the isolation lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process held the lock for the whole timeout.
    #[error("timed out waiting for {} - another credbridge run may be isolating credential helpers", path.display())]
    Timeout {
        /// The lock file
        path: PathBuf,
    },

    /// The lock file could not be created or locked.
    #[error("cannot lock {}: {source}", path.display())]
    Io {
        /// The lock file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// An exclusive lock on the credential-helper isolation window.
#[derive(Debug)]
pub struct HelperLock {
    path: PathBuf,
    file: Option<File>,
}

impl HelperLock {
    /// Default lock file path: `~/.credbridge/lock.credential-helpers`.
    ///
    /// # Example
    ///
    /// ```
    /// use credbridge::git::HelperLock;
    ///
    /// let path = HelperLock::default_path();
    /// assert!(path.to_string_lossy().contains("lock.credential-helpers"));
    /// ```
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".credbridge").join("lock.credential-helpers")
    }

    /// Acquire the lock at `path`, polling until `timeout`.
    ///
    /// # Errors
    ///
    /// - [`LockError::Timeout`] if another holder keeps it past `timeout`
    /// - [`LockError::Io`] if the file cannot be created or locked
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        // `None` when `timeout` is too large to represent: never give up.
        let deadline = Instant::now().checked_add(timeout);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(lock);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                });
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    /// Try once; `Ok(None)` if someone else holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file: Some(file),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    /// Is the lock currently held?
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// The lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HelperLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
