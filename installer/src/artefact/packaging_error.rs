//! Error types for release packaging operations.
//!
//! Covers I/O failures and validation errors that can occur when creating
//! `.tar.gz` release archives.

use std::path::PathBuf;
use thiserror::Error;

/// Errors arising from release packaging operations.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// An I/O operation failed (reading source files, writing the archive).
    #[error("I/O error during packaging: {0}")]
    Io(#[from] std::io::Error),

    /// The source tree does not exist or is not a directory.
    #[error("release source {0} is not a directory")]
    MissingSource(PathBuf),

    /// The source tree has no entries to package.
    #[error("release source {0} is empty; nothing to package")]
    EmptySource(PathBuf),

    /// The output archive would be written inside the tree being packaged.
    #[error("output archive {archive} lies inside the source tree {source_dir}")]
    OutputInsideSource {
        /// The archive path.
        archive: PathBuf,
        /// The source tree root.
        source_dir: PathBuf,
    },
}
