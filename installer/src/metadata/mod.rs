//! Release metadata stores.
//!
//! A store maps a version to its published [`ReleaseRecord`] and exposes the
//! latest-stable pointer. The installer treats every store as read-only; the
//! publish side writes through [`DirectoryStore`] directly.
//!
//! # Sub-modules
//!
//! - [`http`] - `latest.json` / `<version>.json` served over HTTP(S).
//! - [`directory`] - the same layout on a local directory, with writes.
//! - [`github`] - a lower-trust store backed by a GitHub-style release list.

pub mod directory;
pub mod github;
pub mod http;

pub use directory::DirectoryStore;
pub use github::GithubReleaseStore;
pub use http::HttpMetadataStore;

use crate::artefact::download::{UrlFetcher, is_http, local_path};
use crate::release::record::ReleaseRecord;
use crate::release::version::Version;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// File name of the latest-stable pointer document.
pub const LATEST_DOCUMENT: &str = "latest.json";

/// How far a store's answers can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTrust {
    /// A store publishing full records, including digests.
    Primary,
    /// A store whose records may lack digests or other fields.
    Secondary,
}

impl fmt::Display for StoreTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary (lower trust)"),
        }
    }
}

/// Errors raised by metadata stores.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The store could not be reached.
    #[error("metadata store {location} is unreachable: {reason}")]
    Unreachable {
        /// The store location or document URL.
        location: String,
        /// Description of the transport failure.
        reason: String,
    },

    /// A document was fetched but violates the record schema.
    #[error("metadata at {location} is malformed: {reason}")]
    Malformed {
        /// The document URL or path.
        location: String,
        /// Description of the schema violation.
        reason: String,
    },

    /// The latest pointer document does not exist.
    #[error("no latest release is published at {location}")]
    Missing {
        /// The document URL or path.
        location: String,
    },

    /// A record for this version already exists and records are immutable.
    #[error(
        "a release record already exists at {location}; published records are immutable, \
         so another publish probably allocated this version first"
    )]
    AlreadyPublished {
        /// The existing document path.
        location: String,
    },

    /// A local store operation failed.
    #[error("metadata store I/O error at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl MetadataError {
    /// Return true when the error means "no usable answer" rather than a
    /// write conflict: the store is unreachable, the document is missing, or
    /// it is malformed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, Self::AlreadyPublished { .. })
    }
}

/// Read-side interface to a release metadata store.
#[cfg_attr(test, mockall::automock)]
pub trait MetadataStore {
    /// Return the record referenced by the latest-stable pointer.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] when the pointer is unreachable, missing, or
    /// malformed.
    fn latest(&self) -> Result<ReleaseRecord, MetadataError>;

    /// Return the record published for `version`, or `None` if the store
    /// has no record for it.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] when the store is unreachable or the record
    /// is malformed.
    fn release(&self, version: &Version) -> Result<Option<ReleaseRecord>, MetadataError>;

    /// Describe the store for messages (usually its location).
    fn describe(&self) -> String;

    /// Return the store's trust level.
    fn trust(&self) -> StoreTrust;
}

/// Pick a store implementation for `location` by its scheme.
///
/// `http://` and `https://` locations use [`HttpMetadataStore`]; `file://`
/// URLs and bare paths use [`DirectoryStore`].
#[must_use]
pub fn store_for_location(location: &str, timeout: Duration) -> Box<dyn MetadataStore> {
    if is_http(location) {
        return Box::new(HttpMetadataStore::new(
            location,
            Box::new(UrlFetcher::new(timeout)),
        ));
    }
    let path = local_path(location).unwrap_or_else(|| PathBuf::from(location));
    Box::new(DirectoryStore::new(path))
}

/// Map a JSON/schema failure to [`MetadataError::Malformed`].
pub(crate) fn malformed(location: &str, err: &impl fmt::Display) -> MetadataError {
    MetadataError::Malformed {
        location: location.to_owned(),
        reason: err.to_string(),
    }
}
