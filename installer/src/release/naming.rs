//! Artifact naming policy for release archives.
//!
//! Archives are named `<product>-<version-without-prefix>.tar.gz`; for
//! example version `v0.1.7b1` of product `keel` ships as
//! `keel-0.1.7b1.tar.gz`.

use super::version::Version;
use std::fmt;

/// The fixed file extension for release archives.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// The name of the generic install entry point published next to stable
/// releases.
pub const INSTALL_SCRIPT_NAME: &str = "install.sh";

/// A fully-qualified artifact archive name.
///
/// # Examples
///
/// ```
/// use keel_installer::release::naming::ArtifactName;
/// use keel_installer::release::version::Version;
///
/// let version: Version = "v0.1.7b1".parse().expect("valid tag");
/// let name = ArtifactName::new("keel", version);
/// assert_eq!(name.filename(), "keel-0.1.7b1.tar.gz");
/// assert_eq!(
///     name.url_under("https://downloads.example.test/releases/"),
///     "https://downloads.example.test/releases/keel-0.1.7b1.tar.gz"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    product: String,
    version: Version,
}

impl ArtifactName {
    /// Create an artifact name for `product` at `version`.
    #[must_use]
    pub fn new(product: impl Into<String>, version: Version) -> Self {
        Self {
            product: product.into(),
            version,
        }
    }

    /// Return the product component.
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Return the version component.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Return the archive filename.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}-{}{ARCHIVE_EXTENSION}", self.product, self.version.bare())
    }

    /// Return the conventional URL of this archive under `base_url`.
    #[must_use]
    pub fn url_under(&self, base_url: &str) -> String {
        join_url(base_url, &self.filename())
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename())
    }
}

/// Join a base URL (or directory location) and a file name with exactly one
/// separating slash.
#[must_use]
pub fn join_url(base_url: &str, name: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), name)
}

/// Return the record document name for `version` (`<bare>.json`).
#[must_use]
pub fn record_filename(version: &Version) -> String {
    format!("{}.json", version.bare())
}
