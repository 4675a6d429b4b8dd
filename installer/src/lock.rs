//! Host-level install lock.
//!
//! Two installs racing on the same target would both try to rename the
//! current directory to a backup. Local installs hold an exclusive advisory
//! lock on `<install_dir>.lock` for the whole transaction; the lock is
//! released when the guard is dropped.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while taking the install lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another install holds the lock.
    #[error("another install into {install_dir} is in progress (lock held on {lock})")]
    Busy {
        /// The contended install directory.
        install_dir: PathBuf,
        /// The lock file.
        lock: PathBuf,
    },

    /// The lock file could not be opened.
    #[error("cannot open install lock {path}: {source}")]
    Io {
        /// The lock file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// An exclusive lock on an install directory, held until dropped.
#[derive(Debug)]
pub struct HostLock {
    _file: File,
    path: PathBuf,
}

impl HostLock {
    /// Take the lock for `install_dir` without blocking.
    ///
    /// The lock file is created next to the install directory, so the
    /// parent directory is created if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Busy`] if another process holds the lock and
    /// [`LockError::Io`] if the lock file cannot be opened.
    pub fn acquire(install_dir: &Path) -> Result<Self, LockError> {
        let path = lock_path(install_dir);
        let io_error = |source| LockError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_error)?;
        fs2::FileExt::try_lock_exclusive(&file).map_err(|err| {
            if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                LockError::Busy {
                    install_dir: install_dir.to_path_buf(),
                    lock: path.clone(),
                }
            } else {
                io_error(err)
            }
        })?;
        log::debug!("holding install lock {}", path.display());
        Ok(Self { _file: file, path })
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Return the lock file used for `install_dir`: the directory path with
/// `.lock` appended.
#[must_use]
pub fn lock_path(install_dir: &Path) -> PathBuf {
    let mut name = OsString::from(install_dir.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}
