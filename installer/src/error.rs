//! Error types for the keel installer CLIs.
//!
//! Each component reports its own error type; [`InstallerError`] folds them
//! together for the binaries, which print the message and exit with status
//! 1. Messages carry remediation hints where the operator has something to
//! do about the failure.

use crate::artefact::download::FetchError;
use crate::config::ConfigError;
use crate::host::HostError;
use crate::lock::LockError;
use crate::publish::PublishError;
use crate::release::version::Version;
use crate::resolution::ResolveError;
use crate::transaction::TransactionError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during an install or publish run.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request could not be resolved to a release record.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The artifact does not exist at its URL.
    #[error(
        "artifact for {version} not found at {url}; check that the version was published \
         (run with `latest` to install the newest stable release)"
    )]
    ArtifactNotFound {
        /// The requested version.
        version: Version,
        /// The artifact URL.
        url: String,
    },

    /// The artifact could not be downloaded.
    #[error(transparent)]
    Download(FetchError),

    /// Another install holds the target.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The install transaction aborted.
    #[error(transparent)]
    Transaction(#[from] Box<TransactionError>),

    /// The install committed but the post-install hook failed.
    #[error(
        "{version} was installed to {install_dir}, but the post-install step failed: {source}; \
         fix the cause and re-run the step in {install_dir}"
    )]
    PostInstall {
        /// The installed version.
        version: Version,
        /// The committed install directory.
        install_dir: PathBuf,
        /// The hook failure.
        #[source]
        source: HostError,
    },

    /// Publishing failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl InstallerError {
    /// Classify a download failure for `version` at `url`.
    #[must_use]
    pub fn from_fetch(version: Version, url: &str, source: FetchError) -> Self {
        if source.is_not_found() {
            Self::ArtifactNotFound {
                version,
                url: url.to_owned(),
            }
        } else {
            Self::Download(source)
        }
    }
}

impl From<TransactionError> for InstallerError {
    fn from(err: TransactionError) -> Self {
        Self::Transaction(Box::new(err))
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
