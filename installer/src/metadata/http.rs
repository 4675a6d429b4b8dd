//! Metadata store served over HTTP(S).

use super::{LATEST_DOCUMENT, MetadataError, MetadataStore, StoreTrust, malformed};
use crate::artefact::download::{DocumentSource, FetchError};
use crate::release::naming::{join_url, record_filename};
use crate::release::record::{ReleaseRecord, parse_latest, parse_record};
use crate::release::version::Version;

/// A store reading `latest.json` and `<version>.json` under a base URL.
pub struct HttpMetadataStore {
    base_url: String,
    source: Box<dyn DocumentSource>,
}

impl HttpMetadataStore {
    /// Create a store rooted at `base_url`, fetching documents via `source`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, source: Box<dyn DocumentSource>) -> Self {
        Self {
            base_url: base_url.into(),
            source,
        }
    }

    fn fetch(&self, name: &str) -> Result<Option<(String, String)>, MetadataError> {
        let url = join_url(&self.base_url, name);
        log::debug!("fetching metadata {url}");
        match self.source.fetch_text(&url) {
            Ok(body) => Ok(Some((url, body))),
            Err(FetchError::NotFound { .. }) => Ok(None),
            Err(err) => Err(MetadataError::Unreachable {
                location: url,
                reason: err.to_string(),
            }),
        }
    }
}

impl MetadataStore for HttpMetadataStore {
    fn latest(&self) -> Result<ReleaseRecord, MetadataError> {
        let Some((url, body)) = self.fetch(LATEST_DOCUMENT)? else {
            return Err(MetadataError::Missing {
                location: join_url(&self.base_url, LATEST_DOCUMENT),
            });
        };
        parse_latest(&body)
            .map(|pointer| pointer.into_record())
            .map_err(|e| malformed(&url, &e))
    }

    fn release(&self, version: &Version) -> Result<Option<ReleaseRecord>, MetadataError> {
        let Some((url, body)) = self.fetch(&record_filename(version))? else {
            return Ok(None);
        };
        parse_record(&body).map(Some).map_err(|e| malformed(&url, &e))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn trust(&self) -> StoreTrust {
        StoreTrust::Primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::download::MockDocumentSource;
    use crate::test_utils::{latest_json, record_json};
    use mockall::predicate::eq;

    const BASE: &str = "https://downloads.example.test/keel";

    fn store_with(source: MockDocumentSource) -> HttpMetadataStore {
        HttpMetadataStore::new(BASE, Box::new(source))
    }

    #[test]
    fn latest_reads_pointer_document() {
        let mut source = MockDocumentSource::new();
        source
            .expect_fetch_text()
            .with(eq("https://downloads.example.test/keel/latest.json"))
            .returning(|_| Ok(latest_json("0.1.6")));

        let record = store_with(source).latest().expect("latest");
        assert_eq!(record.version().bare(), "0.1.6");
    }

    #[test]
    fn missing_latest_is_reported_as_missing() {
        let mut source = MockDocumentSource::new();
        source.expect_fetch_text().returning(|url| {
            Err(FetchError::NotFound {
                url: url.to_owned(),
            })
        });

        let err = store_with(source).latest().expect_err("missing");
        assert!(matches!(err, MetadataError::Missing { .. }));
    }

    #[test]
    fn transport_failure_is_unreachable() {
        let mut source = MockDocumentSource::new();
        source.expect_fetch_text().returning(|url| {
            Err(FetchError::Network {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            })
        });

        let err = store_with(source).latest().expect_err("unreachable");
        assert!(matches!(err, MetadataError::Unreachable { .. }));
    }

    #[test]
    fn prerelease_pointer_is_malformed() {
        let mut source = MockDocumentSource::new();
        source
            .expect_fetch_text()
            .returning(|_| Ok(latest_json("0.1.7b1")));

        let err = store_with(source).latest().expect_err("prerelease pointer");
        assert!(matches!(err, MetadataError::Malformed { .. }));
    }

    #[test]
    fn release_reads_bare_version_document() {
        let mut source = MockDocumentSource::new();
        source
            .expect_fetch_text()
            .with(eq("https://downloads.example.test/keel/0.1.7b2.json"))
            .returning(|_| Ok(record_json("0.1.7b2")));

        let version: Version = "v0.1.7b2".parse().expect("valid");
        let record = store_with(source)
            .release(&version)
            .expect("fetch")
            .expect("present");
        assert!(record.is_prerelease());
    }

    #[test]
    fn absent_release_is_none() {
        let mut source = MockDocumentSource::new();
        source.expect_fetch_text().returning(|url| {
            Err(FetchError::NotFound {
                url: url.to_owned(),
            })
        });

        let version: Version = "v0.0.9".parse().expect("valid");
        assert!(store_with(source).release(&version).expect("fetch").is_none());
    }

    #[test]
    fn truncated_record_is_malformed() {
        let mut source = MockDocumentSource::new();
        source
            .expect_fetch_text()
            .returning(|_| Ok(r#"{"version":"0.1.7""#.to_owned()));

        let version: Version = "v0.1.7".parse().expect("valid");
        let err = store_with(source).release(&version).expect_err("malformed");
        assert!(matches!(err, MetadataError::Malformed { .. }));
    }
}
