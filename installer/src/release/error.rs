//! Error types for release record validation.
//!
//! Each variant names the invalid input and the constraint it violated so
//! that schema violations surface as actionable messages rather than empty
//! fields.

use super::version::{ParseError, Version};
use thiserror::Error;

/// Errors arising from invalid release record values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// The record version could not be parsed.
    #[error("invalid record version: {0}")]
    InvalidVersion(#[from] ParseError),

    /// The `isPrerelease` flag disagrees with the version suffix.
    #[error("record for {version} has isPrerelease = {flag}, which contradicts its version tag")]
    PrereleaseFlagMismatch {
        /// The record version.
        version: Version,
        /// The flag found in the record.
        flag: bool,
    },

    /// The artifact URL is empty.
    #[error("record for {version} has an empty artifact url")]
    EmptyUrl {
        /// The record version.
        version: Version,
    },

    /// The latest pointer references a prerelease.
    #[error("latest pointer references prerelease {version}; only stable releases may be latest")]
    PrereleaseLatest {
        /// The prerelease version found in the pointer.
        version: Version,
    },
}

/// Result type alias using [`RecordError`].
pub type Result<T> = std::result::Result<T, RecordError>;
