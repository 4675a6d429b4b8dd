//! Integrity verification for downloaded release archives.
//!
//! A record that carries a digest is checked strictly: any difference is an
//! [`IntegrityError`] and the caller must discard the archive. A record
//! without a digest only exists on the legacy compatibility path; such an
//! archive is reported as [`VerificationOutcome::Unverified`] and the
//! [`VerificationPolicy`] decides whether that is acceptable.

use crate::release::sha256_digest::Sha256Digest;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Policy governing whether an archive without an expected digest may be
/// installed.
///
/// # Examples
///
/// ```
/// use keel_installer::artefact::verification::VerificationPolicy;
///
/// let policy = VerificationPolicy::default();
/// assert!(!policy.require_checksum());
/// assert!(VerificationPolicy::strict().require_checksum());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationPolicy {
    require_checksum: bool,
}

impl VerificationPolicy {
    /// A policy that refuses archives without an expected digest.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            require_checksum: true,
        }
    }

    /// Build a policy from the `--require-checksum` switch.
    #[must_use]
    pub const fn requiring_checksum(require_checksum: bool) -> Self {
        Self { require_checksum }
    }

    /// Return whether every install must be checksum-verified.
    #[must_use]
    pub const fn require_checksum(&self) -> bool {
        self.require_checksum
    }
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.require_checksum {
            write!(f, "checksum verification required")
        } else {
            write!(f, "unverified legacy artifacts allowed with warning")
        }
    }
}

/// Result of a successful verification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The archive matched the expected digest.
    Verified {
        /// The digest that matched.
        digest: Sha256Digest,
    },
    /// No expected digest was available; the archive was not checked.
    Unverified {
        /// The digest of the archive as fetched, for the operator's records.
        actual: Sha256Digest,
    },
}

impl VerificationOutcome {
    /// Return true when the archive was checked against an expected digest.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// Errors raised when an archive fails verification.
///
/// Every variant is fatal; there is no retry-with-ignore path.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// The archive digest differs from the published one.
    #[error(
        "checksum mismatch for {path}: expected {expected}, got {actual}; \
         the download is corrupt or has been tampered with and was discarded"
    )]
    Mismatch {
        /// The archive that failed.
        path: PathBuf,
        /// The published digest.
        expected: Sha256Digest,
        /// The computed digest.
        actual: Sha256Digest,
    },

    /// The archive size differs from the published one.
    #[error(
        "size mismatch for {path}: expected {expected} bytes, got {actual}; \
         the download was truncated or replaced and was discarded"
    )]
    SizeMismatch {
        /// The archive that failed.
        path: PathBuf,
        /// The published size.
        expected: u64,
        /// The size on disk.
        actual: u64,
    },

    /// The archive could not be read for hashing.
    #[error("could not read {path} for verification: {source}")]
    Read {
        /// The archive that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Compute the SHA-256 digest of a file.
///
/// Reads the file at `path` in chunks and returns the lowercase hex digest.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(Sha256Digest::from_hasher(hasher))
}

/// Verify the archive at `path` against an optional expected digest and size.
///
/// The size is checked before hashing so that truncated downloads fail
/// fast. Comparison is on normalised lowercase hex, so published digests in
/// either case are accepted.
///
/// # Errors
///
/// Returns an [`IntegrityError`] when the archive differs from what was
/// published or cannot be read.
pub fn verify_checksum(
    path: &Path,
    expected: Option<&Sha256Digest>,
    expected_size: Option<u64>,
) -> Result<VerificationOutcome, IntegrityError> {
    let read_error = |source| IntegrityError::Read {
        path: path.to_path_buf(),
        source,
    };

    if let Some(size) = expected_size {
        let actual = fs::metadata(path).map_err(read_error)?.len();
        if actual != size {
            return Err(IntegrityError::SizeMismatch {
                path: path.to_path_buf(),
                expected: size,
                actual,
            });
        }
    }

    let actual = compute_sha256(path).map_err(read_error)?;
    match expected {
        Some(digest) if *digest == actual => Ok(VerificationOutcome::Verified { digest: actual }),
        Some(digest) => Err(IntegrityError::Mismatch {
            path: path.to_path_buf(),
            expected: digest.clone(),
            actual,
        }),
        None => {
            log::debug!(
                "no published checksum for {}; continuing without integrity verification \
                 (sha256 {actual})",
                path.display()
            );
            Ok(VerificationOutcome::Unverified { actual })
        }
    }
}
