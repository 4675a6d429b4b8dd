//! Version resolution.
//!
//! Turns what the operator asked for (`latest` or an explicit tag) into a
//! concrete [`ReleaseRecord`]. `latest` only ever resolves through the
//! latest-stable pointer and never yields a prerelease. An explicit version
//! whose record is absent may fall back to the conventional artifact URL,
//! but then installs without integrity verification and says so.

use crate::artefact::verification::VerificationPolicy;
use crate::metadata::{MetadataError, MetadataStore, StoreTrust};
use crate::release::naming::ArtifactName;
use crate::release::record::ReleaseRecord;
use crate::release::version::{ParseError, Version};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The symbolic name for the newest stable release.
pub const LATEST: &str = "latest";

/// What the operator asked to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionRequest {
    /// The newest stable release.
    #[default]
    Latest,
    /// One specific version, stable or prerelease.
    Explicit(Version),
}

impl VersionRequest {
    /// Parse `latest` (case-insensitive) or a version tag.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the input is neither.
    ///
    /// # Examples
    ///
    /// ```
    /// use keel_installer::resolution::VersionRequest;
    ///
    /// assert_eq!(VersionRequest::parse("LATEST"), Ok(VersionRequest::Latest));
    /// assert!(matches!(
    ///     VersionRequest::parse("v0.1.7b1"),
    ///     Ok(VersionRequest::Explicit(v)) if v.is_prerelease()
    /// ));
    /// assert!(VersionRequest::parse("newest").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case(LATEST) {
            return Ok(Self::Latest);
        }
        trimmed.parse().map(Self::Explicit)
    }
}

impl FromStr for VersionRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Explicit(version) => write!(f, "{version}"),
        }
    }
}

/// Where a resolved record came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    /// A store publishing complete records.
    Primary(String),
    /// The lower-trust secondary store.
    Secondary(String),
    /// No metadata; the URL was built from the naming convention.
    ConventionalUrl,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary(location) => write!(f, "{location}"),
            Self::Secondary(location) => write!(f, "{location} (lower trust)"),
            Self::ConventionalUrl => f.write_str("conventional artifact URL"),
        }
    }
}

/// A resolved release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The record to install.
    pub record: ReleaseRecord,
    /// Whether the record carries a digest to verify the download against.
    pub verified: bool,
    /// Where the record came from.
    pub source: ResolutionSource,
    /// Operator-visible warnings raised while resolving.
    pub warnings: Vec<String>,
}

/// Errors raised while resolving a request.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The request is not `latest` and not a valid tag.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// No store could answer with a usable record.
    #[error("cannot resolve {request}: {source}")]
    MetadataUnavailable {
        /// The request being resolved.
        request: VersionRequest,
        /// The store failure.
        #[source]
        source: MetadataError,
    },

    /// A store answered with a record for a different version.
    #[error("metadata at {location} describes {found}, but {requested} was requested")]
    VersionMismatch {
        /// The requested version.
        requested: Version,
        /// The version in the record.
        found: Version,
        /// The store that answered.
        location: String,
    },

    /// The latest pointer references a prerelease.
    #[error("the latest pointer at {location} references prerelease {version}; refusing to install it as latest")]
    PrereleaseLatest {
        /// The offending version.
        version: Version,
        /// The store that answered.
        location: String,
    },

    /// Only an unverifiable record is available but checksums are required.
    #[error("{version} has no published checksum and checksums are required: {reason}")]
    UnverifiedRefused {
        /// The version that cannot be verified.
        version: Version,
        /// Why no digest is available.
        reason: String,
    },
}

/// Resolves requests against a primary store and an optional lower-trust
/// secondary store.
pub struct VersionResolver<'a> {
    primary: &'a dyn MetadataStore,
    secondary: Option<&'a dyn MetadataStore>,
    policy: VerificationPolicy,
    product: String,
    artifact_base: String,
}

impl<'a> VersionResolver<'a> {
    /// Create a resolver reading `primary`. Conventional fallback URLs are
    /// built as `<artifact_base>/<product>-<version>.tar.gz`.
    #[must_use]
    pub fn new(
        primary: &'a dyn MetadataStore,
        product: impl Into<String>,
        artifact_base: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary: None,
            policy: VerificationPolicy::default(),
            product: product.into(),
            artifact_base: artifact_base.into(),
        }
    }

    /// Consult `store` when the primary cannot answer a `latest` request.
    #[must_use]
    pub fn with_secondary(mut self, store: &'a dyn MetadataStore) -> Self {
        self.secondary = Some(store);
        self
    }

    /// Apply `policy` to unverifiable results.
    #[must_use]
    pub const fn with_policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve `request` to a record.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when no acceptable record can be produced.
    pub fn resolve(&self, request: VersionRequest) -> Result<Resolution, ResolveError> {
        let resolution = match request {
            VersionRequest::Latest => self.resolve_latest()?,
            VersionRequest::Explicit(version) => self.resolve_explicit(version)?,
        };
        if !resolution.verified && self.policy.require_checksum() {
            return Err(ResolveError::UnverifiedRefused {
                version: *resolution.record.version(),
                reason: format!("resolved through {}", resolution.source),
            });
        }
        log::info!(
            "resolved {request} to {} via {}",
            resolution.record.version(),
            resolution.source
        );
        Ok(resolution)
    }

    fn resolve_latest(&self) -> Result<Resolution, ResolveError> {
        let primary_err = match self.primary.latest() {
            Ok(record) => return accept_latest(self.primary, record, Vec::new()),
            Err(err) => err,
        };
        let Some(secondary) = self.secondary else {
            return Err(unavailable(VersionRequest::Latest, primary_err));
        };
        log::debug!(
            "primary store {} cannot answer latest: {primary_err}",
            self.primary.describe()
        );
        match secondary.latest() {
            Ok(record) => {
                let warnings = vec![format!(
                    "primary metadata store is unavailable ({primary_err}); \
                     using lower-trust store {}",
                    secondary.describe()
                )];
                accept_latest(secondary, record, warnings)
            }
            Err(secondary_err) => {
                log::warn!(
                    "secondary store {} cannot answer latest either: {secondary_err}",
                    secondary.describe()
                );
                Err(unavailable(VersionRequest::Latest, primary_err))
            }
        }
    }

    fn resolve_explicit(&self, version: Version) -> Result<Resolution, ResolveError> {
        let location = self.primary.describe();
        let reason = match self.primary.release(&version) {
            Ok(Some(record)) => {
                if *record.version() != version {
                    return Err(ResolveError::VersionMismatch {
                        requested: version,
                        found: *record.version(),
                        location,
                    });
                }
                return Ok(from_store(self.primary, record, Vec::new()));
            }
            Ok(None) => format!("no release metadata for {version} at {location}"),
            Err(err @ MetadataError::Malformed { .. }) => {
                return Err(unavailable(VersionRequest::Explicit(version), err));
            }
            Err(err) => format!("release metadata for {version} is unavailable: {err}"),
        };
        Ok(self.conventional(version, &reason))
    }

    fn conventional(&self, version: Version, reason: &str) -> Resolution {
        let url = ArtifactName::new(self.product.as_str(), version).url_under(&self.artifact_base);
        let warning = format!(
            "{reason}; falling back to {url} WITHOUT integrity verification \
             (only releases published before metadata tracking should need this)"
        );
        Resolution {
            record: ReleaseRecord::best_effort(version, url),
            verified: false,
            source: ResolutionSource::ConventionalUrl,
            warnings: vec![warning],
        }
    }
}

fn accept_latest(
    store: &dyn MetadataStore,
    record: ReleaseRecord,
    warnings: Vec<String>,
) -> Result<Resolution, ResolveError> {
    if record.is_prerelease() || record.version().is_prerelease() {
        return Err(ResolveError::PrereleaseLatest {
            version: *record.version(),
            location: store.describe(),
        });
    }
    Ok(from_store(store, record, warnings))
}

fn from_store(
    store: &dyn MetadataStore,
    record: ReleaseRecord,
    mut warnings: Vec<String>,
) -> Resolution {
    let verified = record.sha256().is_some();
    if !verified {
        warnings.push(format!(
            "{} publishes no checksum for {}; the download cannot be verified",
            store.describe(),
            record.version()
        ));
    }
    let source = match store.trust() {
        StoreTrust::Primary => ResolutionSource::Primary(store.describe()),
        StoreTrust::Secondary => ResolutionSource::Secondary(store.describe()),
    };
    Resolution {
        record,
        verified,
        source,
        warnings,
    }
}

fn unavailable(request: VersionRequest, source: MetadataError) -> ResolveError {
    ResolveError::MetadataUnavailable { request, source }
}

#[cfg(test)]
#[path = "resolution_tests.rs"]
mod tests;
