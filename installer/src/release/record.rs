//! Release metadata records and the latest-release pointer.
//!
//! Records are published as JSON documents (`<version>.json` and
//! `latest.json`):
//!
//! ```json
//! {
//!   "version": "0.1.7",
//!   "url": "https://downloads.example.test/keel-0.1.7.tar.gz",
//!   "sha256": "…",
//!   "releaseDate": "2026-03-01T12:00:00Z",
//!   "isPrerelease": false,
//!   "fileSize": 1048576
//! }
//! ```
//!
//! Deserialisation is strict: every field must be present and valid, and the
//! prerelease flag must agree with the version tag. In memory the digest,
//! date, and size are optional so that best-effort records (built from a
//! naming convention or a lower-trust source) can be represented; such
//! records are never produced by parsing a published document.

use super::error::{RecordError, Result};
use super::sha256_digest::Sha256Digest;
use super::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable descriptor of a published artifact.
///
/// # Examples
///
/// ```
/// use keel_installer::release::record::parse_record;
///
/// let json = concat!(
///     r#"{"version":"0.1.7b1","url":"https://example.test/keel-0.1.7b1.tar.gz","#,
///     r#""sha256":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","#,
///     r#""releaseDate":"2026-03-01T12:00:00Z","isPrerelease":true,"fileSize":42}"#,
/// );
/// let record = parse_record(json).expect("valid record");
/// assert!(record.is_prerelease());
/// assert_eq!(record.size_bytes(), Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordWire", rename_all = "camelCase")]
pub struct ReleaseRecord {
    version: Version,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<Sha256Digest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    release_date: Option<DateTime<Utc>>,
    is_prerelease: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,
}

/// Wire form of a record: every field is mandatory.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordWire {
    version: Version,
    url: String,
    sha256: Sha256Digest,
    release_date: DateTime<Utc>,
    is_prerelease: bool,
    file_size: u64,
}

impl TryFrom<RecordWire> for ReleaseRecord {
    type Error = RecordError;

    fn try_from(wire: RecordWire) -> Result<Self> {
        if wire.is_prerelease != wire.version.is_prerelease() {
            return Err(RecordError::PrereleaseFlagMismatch {
                version: wire.version,
                flag: wire.is_prerelease,
            });
        }
        if wire.url.trim().is_empty() {
            return Err(RecordError::EmptyUrl {
                version: wire.version,
            });
        }
        Ok(Self {
            version: wire.version,
            url: wire.url,
            sha256: Some(wire.sha256),
            release_date: Some(wire.release_date),
            is_prerelease: wire.is_prerelease,
            file_size: Some(wire.file_size),
        })
    }
}

impl ReleaseRecord {
    /// Build a fully-populated record for a freshly published artifact.
    #[must_use]
    pub fn published(
        version: Version,
        url: impl Into<String>,
        sha256: Sha256Digest,
        release_date: DateTime<Utc>,
        file_size: u64,
    ) -> Self {
        Self {
            version,
            url: url.into(),
            sha256: Some(sha256),
            release_date: Some(release_date),
            is_prerelease: version.is_prerelease(),
            file_size: Some(file_size),
        }
    }

    /// Build a best-effort record carrying only a version and a URL.
    ///
    /// Such a record cannot be integrity-checked until a digest is attached
    /// with [`Self::with_sha256`].
    #[must_use]
    pub fn best_effort(version: Version, url: impl Into<String>) -> Self {
        Self {
            version,
            url: url.into(),
            sha256: None,
            release_date: None,
            is_prerelease: version.is_prerelease(),
            file_size: None,
        }
    }

    /// Attach an expected digest.
    #[must_use]
    pub fn with_sha256(mut self, sha256: Option<Sha256Digest>) -> Self {
        self.sha256 = sha256;
        self
    }

    /// Attach a release timestamp.
    #[must_use]
    pub fn with_release_date(mut self, release_date: Option<DateTime<Utc>>) -> Self {
        self.release_date = release_date;
        self
    }

    /// Attach an expected artifact size.
    #[must_use]
    pub fn with_file_size(mut self, file_size: Option<u64>) -> Self {
        self.file_size = file_size;
        self
    }

    /// Return the release version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Return the artifact URL.
    #[must_use]
    pub fn artifact_url(&self) -> &str {
        &self.url
    }

    /// Return the expected artifact digest, if known.
    #[must_use]
    pub fn sha256(&self) -> Option<&Sha256Digest> {
        self.sha256.as_ref()
    }

    /// Return the release timestamp, if known.
    #[must_use]
    pub fn release_date(&self) -> Option<DateTime<Utc>> {
        self.release_date
    }

    /// Return true when the record describes a prerelease.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.is_prerelease
    }

    /// Return the expected artifact size in bytes, if known.
    #[must_use]
    pub fn size_bytes(&self) -> Option<u64> {
        self.file_size
    }
}

/// The single mutable pointer to the most recent stable release.
///
/// A pointer can never reference a prerelease: both [`LatestPointer::new`]
/// and deserialisation reject one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LatestWire")]
pub struct LatestPointer {
    #[serde(flatten)]
    record: ReleaseRecord,
    #[serde(rename = "installScript")]
    install_script: String,
}

#[derive(Deserialize)]
struct LatestWire {
    #[serde(flatten)]
    record: ReleaseRecord,
    #[serde(rename = "installScript")]
    install_script: String,
}

impl TryFrom<LatestWire> for LatestPointer {
    type Error = RecordError;

    fn try_from(wire: LatestWire) -> Result<Self> {
        Self::new(wire.record, wire.install_script)
    }
}

impl LatestPointer {
    /// Point at `record`, advertising `install_script` as the entry point.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::PrereleaseLatest`] when `record` is a
    /// prerelease.
    pub fn new(record: ReleaseRecord, install_script: impl Into<String>) -> Result<Self> {
        if record.is_prerelease() || record.version().is_prerelease() {
            return Err(RecordError::PrereleaseLatest {
                version: *record.version(),
            });
        }
        Ok(Self {
            record,
            install_script: install_script.into(),
        })
    }

    /// Return the referenced record.
    #[must_use]
    pub fn record(&self) -> &ReleaseRecord {
        &self.record
    }

    /// Consume the pointer and return the referenced record.
    #[must_use]
    pub fn into_record(self) -> ReleaseRecord {
        self.record
    }

    /// Return the generic install entry point URL.
    #[must_use]
    pub fn install_script(&self) -> &str {
        &self.install_script
    }
}

/// Parse a `<version>.json` document.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or violates the record schema.
pub fn parse_record(json: &str) -> std::result::Result<ReleaseRecord, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parse a `latest.json` document.
///
/// # Errors
///
/// Returns an error if the JSON is malformed, violates the record schema, or
/// points at a prerelease.
pub fn parse_latest(json: &str) -> std::result::Result<LatestPointer, serde_json::Error> {
    serde_json::from_str(json)
}
