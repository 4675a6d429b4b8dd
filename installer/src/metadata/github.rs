//! Lower-trust metadata store backed by a GitHub-style release list.
//!
//! Only consulted when the primary store cannot answer a `latest` request.
//! Release entries carry a tag, a publication time and assets; the archive
//! asset is located by its conventional name. Assets may expose a
//! `sha256:<hex>` digest, in which case the resulting record can still be
//! verified; otherwise it is best-effort.

use super::{MetadataError, MetadataStore, StoreTrust, malformed};
use crate::artefact::download::{DocumentSource, FetchError};
use crate::release::naming::{ArtifactName, join_url};
use crate::release::record::ReleaseRecord;
use crate::release::sha256_digest::Sha256Digest;
use crate::release::version::Version;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One asset attached to a release.
#[derive(Debug, Clone, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
    size: u64,
    #[serde(default)]
    digest: Option<String>,
}

/// The subset of a release document this store relies on.
#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

/// A store reading `<api>/releases/latest` and `<api>/releases/tags/<tag>`.
pub struct GithubReleaseStore {
    api_base: String,
    product: String,
    source: Box<dyn DocumentSource>,
}

impl GithubReleaseStore {
    /// Create a store for `product` releases listed under `api_base`
    /// (for example `https://api.github.com/repos/acme/keel`).
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        product: impl Into<String>,
        source: Box<dyn DocumentSource>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            product: product.into(),
            source,
        }
    }

    fn fetch(&self, path: &str) -> Result<Option<(String, GithubRelease)>, MetadataError> {
        let url = join_url(&self.api_base, path);
        let body = match self.source.fetch_text(&url) {
            Ok(body) => body,
            Err(FetchError::NotFound { .. }) => return Ok(None),
            Err(err) => {
                return Err(MetadataError::Unreachable {
                    location: url,
                    reason: err.to_string(),
                });
            }
        };
        let release = serde_json::from_str(&body).map_err(|e| malformed(&url, &e))?;
        Ok(Some((url, release)))
    }

    fn to_record(
        &self,
        url: &str,
        release: &GithubRelease,
    ) -> Result<ReleaseRecord, MetadataError> {
        if release.draft || release.prerelease {
            return Err(malformed(
                url,
                &format!("release {} is a draft or prerelease", release.tag_name),
            ));
        }
        let version: Version = release
            .tag_name
            .parse()
            .map_err(|e| malformed(url, &e))?;
        let expected = ArtifactName::new(self.product.clone(), version).filename();
        let asset = release
            .assets
            .iter()
            .find(|asset| asset.name == expected)
            .ok_or_else(|| malformed(url, &format!("release has no asset named {expected}")))?;

        let sha256 = asset.digest.as_deref().and_then(parse_asset_digest);
        if sha256.is_none() {
            log::debug!("asset {expected} at {url} publishes no sha256 digest");
        }
        Ok(ReleaseRecord::best_effort(version, asset.browser_download_url.clone())
            .with_sha256(sha256)
            .with_release_date(release.published_at)
            .with_file_size(Some(asset.size)))
    }
}

/// Parse a `sha256:<hex>` asset digest.
fn parse_asset_digest(raw: &str) -> Option<Sha256Digest> {
    let hex = raw.strip_prefix("sha256:")?;
    Sha256Digest::try_from(hex).ok()
}

impl MetadataStore for GithubReleaseStore {
    fn latest(&self) -> Result<ReleaseRecord, MetadataError> {
        let Some((url, release)) = self.fetch("releases/latest")? else {
            return Err(MetadataError::Missing {
                location: join_url(&self.api_base, "releases/latest"),
            });
        };
        let record = self.to_record(&url, &release)?;
        if record.is_prerelease() {
            return Err(malformed(
                &url,
                &format!("latest release {} is a prerelease", record.version()),
            ));
        }
        Ok(record)
    }

    fn release(&self, version: &Version) -> Result<Option<ReleaseRecord>, MetadataError> {
        let Some((url, release)) = self.fetch(&format!("releases/tags/{version}"))? else {
            return Ok(None);
        };
        self.to_record(&url, &release).map(Some)
    }

    fn describe(&self) -> String {
        self.api_base.clone()
    }

    fn trust(&self) -> StoreTrust {
        StoreTrust::Secondary
    }
}
