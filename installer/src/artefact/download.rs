//! Archive retrieval for release artifacts.
//!
//! Provides a trait-based abstraction for fetching artifacts by URL,
//! enabling dependency injection for testing. `http(s)://` URLs are fetched
//! with `ureq`; `file://` URLs are copied from a local mirror.
//!
//! Fetched archives live in a private temporary directory owned by a
//! [`FetchedArchive`] guard, which removes the file when dropped so that no
//! exit path of an install leaves a stray download behind.

use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Default network timeout for metadata and artifact downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Scheme prefix for local mirrors.
const FILE_SCHEME: &str = "file://";

/// Fallback filename when a URL has no usable final segment.
const FALLBACK_FILENAME: &str = "artifact-download";

/// Trait for fetching an artifact into a local file.
///
/// Abstractions allow tests to mock transport behaviour without network
/// access.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveFetcher {
    /// Fetch `url` and write its body to `dest`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when the artifact does not exist and
    /// [`FetchError::Network`] for any other transport failure.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Trait for fetching small text documents such as metadata records.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentSource {
    /// Fetch `url` and return its body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when the document does not exist and
    /// [`FetchError::Network`] for any other transport failure.
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Errors arising from artifact retrieval.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The requested artifact does not exist (HTTP 404 or missing file).
    #[error("artifact not found at {url}; check that the requested version was published")]
    NotFound {
        /// The URL that was requested.
        url: String,
    },

    /// The transport failed for a reason other than a missing artifact.
    #[error("could not download {url}: {reason}; check network connectivity and retry")]
    Network {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The URL scheme is not supported.
    #[error("unsupported artifact URL {url}; expected http://, https://, or file://")]
    UnsupportedUrl {
        /// The rejected URL.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Return true when the failure indicates a missing artifact rather than
    /// a transport problem.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// URL-dispatching fetcher: `ureq` for HTTP(S), file copy for `file://`.
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    agent: ureq::Agent,
}

impl UrlFetcher {
    /// Create a fetcher whose network requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
        }
    }
}

impl Default for UrlFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ArchiveFetcher for UrlFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        if let Some(path) = local_path(url) {
            return copy_local(url, &path, dest);
        }
        if is_http(url) {
            return download_to_file(&self.agent, url, dest);
        }
        Err(FetchError::UnsupportedUrl {
            url: url.to_owned(),
        })
    }
}

impl DocumentSource for UrlFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        if let Some(path) = local_path(url) {
            return fs::read_to_string(&path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => FetchError::NotFound {
                    url: url.to_owned(),
                },
                _ => FetchError::Io(e),
            });
        }
        if is_http(url) {
            return download_text(&self.agent, url);
        }
        Err(FetchError::UnsupportedUrl {
            url: url.to_owned(),
        })
    }
}

/// An artifact held in a private temporary directory.
///
/// Dropping the guard deletes the directory and the archive inside it.
#[derive(Debug)]
pub struct FetchedArchive {
    dir: TempDir,
    path: PathBuf,
    size: u64,
}

impl FetchedArchive {
    /// Return the local path of the archive.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the number of bytes fetched.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the archive now, logging rather than failing on cleanup errors.
    pub fn discard(self) {
        let location = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            log::warn!(
                "could not remove temporary download {}: {err}",
                location.display()
            );
        }
    }
}

/// Fetch `url` into a fresh private temporary directory.
///
/// # Errors
///
/// Returns a [`FetchError`] if the temporary directory cannot be created or
/// the transfer fails; the partial download is removed in both cases.
pub fn fetch_archive(
    fetcher: &dyn ArchiveFetcher,
    url: &str,
) -> Result<FetchedArchive, FetchError> {
    let dir = tempfile::Builder::new().prefix("keel-fetch-").tempdir()?;
    let path = dir.path().join(archive_filename(url));
    debug!("fetching {url} into {}", path.display());
    let size = fetcher.fetch(url, &path)?;
    Ok(FetchedArchive { dir, path, size })
}

/// Return the local filesystem path of a `file://` URL.
#[must_use]
pub fn local_path(url: &str) -> Option<PathBuf> {
    url.strip_prefix(FILE_SCHEME).map(PathBuf::from)
}

/// Return true for `http://` and `https://` URLs.
#[must_use]
pub fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Derive a safe local filename from the last URL segment.
fn archive_filename(url: &str) -> String {
    let raw = url.rsplit('/').next().unwrap_or_default();
    let raw = raw.split(['?', '#']).next().unwrap_or_default();
    if raw.is_empty() || raw == "." || raw.contains("..") {
        FALLBACK_FILENAME.to_owned()
    } else {
        raw.to_owned()
    }
}

/// Build a `ureq` agent with a global request timeout.
fn http_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Download a URL and return the body as a string.
fn download_text(agent: &ureq::Agent, url: &str) -> Result<String, FetchError> {
    let response = agent.get(url).call().map_err(|e| map_ureq_error(url, &e))?;
    response
        .into_body()
        .read_to_string()
        .map_err(|e| FetchError::Network {
            url: url.to_owned(),
            reason: e.to_string(),
        })
}

/// Download a URL and write the body to a file.
fn download_to_file(agent: &ureq::Agent, url: &str, dest: &Path) -> Result<u64, FetchError> {
    let response = agent.get(url).call().map_err(|e| map_ureq_error(url, &e))?;
    let mut file = fs::File::create(dest)?;
    io::copy(&mut response.into_body().as_reader(), &mut file).map_err(|e| {
        FetchError::Network {
            url: url.to_owned(),
            reason: e.to_string(),
        }
    })
}

/// Copy an artifact from a local mirror.
fn copy_local(url: &str, source: &Path, dest: &Path) -> Result<u64, FetchError> {
    fs::copy(source, dest).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FetchError::NotFound {
            url: url.to_owned(),
        },
        _ => FetchError::Io(e),
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Network {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/keel-0.1.7.tar.gz", &err);
        assert!(mapped.is_not_found());
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_network_error() {
        let err = ureq::Error::StatusCode(500);
        let mapped = map_ureq_error("https://example.test/keel-0.1.7.tar.gz", &err);
        assert!(matches!(mapped, FetchError::Network { .. }));
    }

    #[test]
    fn not_found_and_network_messages_differ() {
        let not_found = FetchError::NotFound {
            url: "u".to_owned(),
        };
        let network = FetchError::Network {
            url: "u".to_owned(),
            reason: "connection refused".to_owned(),
        };
        assert!(not_found.to_string().contains("requested version"));
        assert!(network.to_string().contains("network"));
    }

    #[rstest]
    #[case::plain("https://example.test/r/keel-0.1.7.tar.gz", "keel-0.1.7.tar.gz")]
    #[case::query("https://example.test/r/keel-0.1.7.tar.gz?sig=1", "keel-0.1.7.tar.gz")]
    #[case::trailing_slash("https://example.test/r/", FALLBACK_FILENAME)]
    #[case::dotdot("file:///tmp/..", FALLBACK_FILENAME)]
    fn archive_filename_is_sanitised(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(archive_filename(url), expected);
    }

    #[test]
    fn file_urls_are_copied() {
        let mirror = tempfile::tempdir().expect("temp dir");
        let source = mirror.path().join("keel-0.1.7.tar.gz");
        fs::write(&source, b"archive bytes").expect("write source");
        let url = format!("file://{}", source.display());

        let fetched = fetch_archive(&UrlFetcher::default(), &url).expect("fetch");
        assert_eq!(fetched.size(), 13);
        assert_eq!(fs::read(fetched.path()).expect("read"), b"archive bytes");
    }

    #[test]
    fn local_documents_are_read_as_text() {
        let mirror = tempfile::tempdir().expect("temp dir");
        let source = mirror.path().join("latest.json");
        fs::write(&source, "{}").expect("write document");
        let url = format!("file://{}", source.display());

        let text = UrlFetcher::default().fetch_text(&url).expect("read");
        assert_eq!(text, "{}");
        let missing = UrlFetcher::default()
            .fetch_text("file:///nonexistent/latest.json")
            .expect_err("missing document");
        assert!(missing.is_not_found());
    }

    #[test]
    fn missing_local_file_is_not_found() {
        let url = "file:///nonexistent/keel-9.9.9.tar.gz";
        let err = fetch_archive(&UrlFetcher::default(), url).expect_err("missing file");
        assert!(err.is_not_found());
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = fetch_archive(&UrlFetcher::default(), "ftp://example.test/a.tar.gz")
            .expect_err("unsupported scheme");
        assert!(matches!(err, FetchError::UnsupportedUrl { .. }));
    }

    #[test]
    fn dropping_the_guard_removes_the_download() {
        let mut fetcher = MockArchiveFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_, dest| fs::write(dest, b"bytes").map(|()| 5).map_err(FetchError::Io));

        let fetched = fetch_archive(&fetcher, "https://example.test/keel-0.1.7.tar.gz")
            .expect("fetch");
        let path = fetched.path().to_path_buf();
        assert!(path.exists());
        drop(fetched);
        assert!(!path.exists());
    }

    #[test]
    fn failed_fetch_leaves_no_temporary_file() {
        let mut fetcher = MockArchiveFetcher::new();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen_in_mock = std::sync::Arc::clone(&seen);
        fetcher.expect_fetch().returning(move |url, dest| {
            fs::write(dest, b"partial").map_err(FetchError::Io)?;
            *seen_in_mock.lock().expect("lock") = Some(dest.to_path_buf());
            Err(FetchError::Network {
                url: url.to_owned(),
                reason: "connection reset".to_owned(),
            })
        });

        let err = fetch_archive(&fetcher, "https://example.test/keel-0.1.7.tar.gz")
            .expect_err("fetch fails");
        assert!(matches!(err, FetchError::Network { .. }));
        let partial = seen.lock().expect("lock").clone().expect("fetch attempted");
        assert!(!partial.exists());
    }
}
