//! Install targets: the filesystem operations an install transaction needs.
//!
//! The transaction never touches the filesystem directly. It drives a
//! [`TargetHost`], which is either the local machine ([`LocalHost`]) or an
//! appliance reached over `ssh` ([`RemoteHost`]).

pub mod local;
pub mod remote;

pub use local::LocalHost;
pub use remote::RemoteHost;

use crate::artefact::extraction::ExtractionError;
use crate::exec::ExecError;
use std::path::{Path, PathBuf};

/// Errors raised by a target host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A local filesystem operation failed.
    #[error("failed to {operation} {path}: {source}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A command on the target exited unsuccessfully.
    #[error("{operation} failed on {host}: {message}")]
    Command {
        /// The target description.
        host: String,
        /// What was being attempted.
        operation: &'static str,
        /// The command's diagnostic output.
        message: String,
    },

    /// A command could not be run at all.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Local extraction failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl HostError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of a best-effort permission pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionReport {
    /// Number of files whose executable bits were set.
    pub updated: usize,
    /// Human-readable descriptions of files that could not be updated.
    pub failures: Vec<String>,
}

/// Filesystem operations on an install target.
#[cfg_attr(test, mockall::automock)]
pub trait TargetHost {
    /// Describe the target for messages (`local` or the ssh destination).
    fn describe(&self) -> String;

    /// Return true if `path` exists on the target.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if existence cannot be determined.
    fn exists(&self, path: &Path) -> Result<bool, HostError>;

    /// Rename `from` to `to` without copying.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), HostError>;

    /// Create `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<(), HostError>;

    /// Make the local archive available on the target, returning its path
    /// there.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the archive cannot be transferred.
    fn stage_archive(&self, local: &Path) -> Result<PathBuf, HostError>;

    /// Unpack the staged archive into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if extraction fails or the archive tries to
    /// write outside `dest`.
    fn extract(&self, staged: &Path, dest: &Path) -> Result<(), HostError>;

    /// Read a text file, returning `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the file exists but cannot be read.
    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError>;

    /// Set executable bits on every regular file under `dir`.
    ///
    /// A missing `dir` is not an error. Per-file failures are reported in
    /// the returned [`PermissionReport`].
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the pass cannot run at all.
    fn mark_executable(&self, dir: &Path) -> Result<PermissionReport, HostError>;

    /// Run a shell command with `dir` as the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Command`] if the command exits unsuccessfully.
    fn run_in(&self, dir: &Path, command: &str) -> Result<(), HostError>;

    /// Remove a staged archive created by [`Self::stage_archive`].
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] if the staged copy cannot be removed.
    fn release_staged(&self, staged: &Path) -> Result<(), HostError>;
}

/// Quote `value` for a POSIX shell.
///
/// # Examples
///
/// ```
/// use keel_installer::host::shell_quote;
///
/// assert_eq!(shell_quote("/opt/keel"), "'/opt/keel'");
/// assert_eq!(shell_quote("it's"), r#"'it'\''s'"#);
/// ```
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote a path for a POSIX shell.
#[must_use]
pub fn quote_path(path: &Path) -> String {
    shell_quote(&path.display().to_string())
}

/// Build the shell command that runs `command` inside `dir`.
#[must_use]
pub fn command_in(dir: &Path, command: &str) -> String {
    format!("cd {} && {command}", quote_path(dir))
}
