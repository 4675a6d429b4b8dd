//! Git integration for publishing.
//!
//! The publish flow can read existing release tags to avoid reusing a
//! prerelease number, commit the updated version marker and tag the
//! release. Every call goes through a [`CommandExecutor`], so it is bounded
//! by the executor's timeout.

use crate::exec::{CommandExecutor, ExecError, failure_message};
use crate::release::version::{TAG_PREFIX, Version};
use std::path::Path;
use std::process::Output;
use thiserror::Error;

/// Errors raised by git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// git could not be run.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// git ran but reported a failure.
    #[error("git {operation} failed: {message}")]
    Command {
        /// The git operation that failed (tag, commit, ...).
        operation: &'static str,
        /// git's error output.
        message: String,
    },
}

/// A git working tree driven through an executor.
pub struct GitRepo<'a> {
    root: String,
    executor: &'a dyn CommandExecutor,
}

impl<'a> GitRepo<'a> {
    /// Operate on the working tree at `root`.
    #[must_use]
    pub fn new(root: &Path, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            root: root.display().to_string(),
            executor,
        }
    }

    fn git(&self, operation: &'static str, args: &[&str]) -> Result<Output, GitError> {
        let mut full = vec!["-C", self.root.as_str()];
        full.extend_from_slice(args);
        let output = self.executor.run("git", &full)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(GitError::Command {
                operation,
                message: failure_message(&output),
            })
        }
    }

    /// List every release tag in the repository as a version.
    ///
    /// Tags that do not parse as versions are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if `git tag` fails.
    pub fn release_tags(&self) -> Result<Vec<Version>, GitError> {
        let pattern = format!("{TAG_PREFIX}*");
        let output = self.git("tag", &["tag", "--list", &pattern])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut versions: Vec<Version> = stdout
            .lines()
            .filter_map(|line| match line.trim().parse::<Version>() {
                Ok(version) => Some(version),
                Err(err) => {
                    log::debug!("skipping tag {line:?}: {err}");
                    None
                }
            })
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// Stage `marker` and commit it with a release message.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if `git add` or `git commit` fails.
    pub fn commit_marker(&self, marker: &Path, version: &Version) -> Result<(), GitError> {
        let marker_arg = marker.display().to_string();
        self.git("add", &["add", "--", &marker_arg])?;
        let message = format!("Release {version}");
        self.git("commit", &["commit", "-m", &message, "--", &marker_arg])?;
        Ok(())
    }

    /// Create an annotated tag for `version` at `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError`] if the tag exists or `git tag` fails.
    pub fn tag(&self, version: &Version) -> Result<(), GitError> {
        let tag = version.to_string();
        let message = format!("Release {tag}");
        self.git("tag", &["tag", "-a", &tag, "-m", &message])?;
        log::info!("tagged {tag}");
        Ok(())
    }
}
