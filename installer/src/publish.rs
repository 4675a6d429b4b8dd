//! The publish flow.
//!
//! Mints the next version with [`allocate`], stamps the version marker into
//! the release tree, packages it and writes the release record into a
//! [`DirectoryStore`]. Stable publishes also move the latest pointer and
//! replace the generic install entry point; prereleases never touch either.
//!
//! Records are written with a conditional write, so two publishers that
//! allocate the same version from a stale view cannot both succeed. The
//! archive is packaged into a scratch directory and only moved next to the
//! records once the record write has won.

use crate::allocator::{AllocationError, PublishPlan, allocate, newest_stable};
use crate::artefact::packaging::package_release;
use crate::artefact::packaging_error::PackagingError;
use crate::git::{GitError, GitRepo};
use crate::metadata::{DirectoryStore, MetadataError};
use crate::release::error::RecordError;
use crate::release::naming::{ArtifactName, INSTALL_SCRIPT_NAME, join_url};
use crate::release::record::{LatestPointer, ReleaseRecord};
use crate::release::version::{BumpKind, Version};
use crate::transaction::VERSION_MARKER;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

/// Inputs to a publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Product name used in artifact file names.
    pub product: String,
    /// The release tree to package. The version marker is written here.
    pub source_dir: PathBuf,
    /// Public URL under which the store's directory is served.
    pub base_url: String,
    /// Which component to bump.
    pub bump: BumpKind,
    /// Publish a prerelease of the bumped target instead of the target.
    pub prerelease: bool,
    /// Use this as the current stable version instead of reading the
    /// latest pointer.
    pub current_stable: Option<Version>,
    /// Script published as the generic install entry point on stable
    /// releases.
    pub install_script: Option<PathBuf>,
}

/// What a publish produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// The allocation that was published.
    pub plan: PublishPlan,
    /// The written release record.
    pub record: ReleaseRecord,
    /// Where the archive now lives.
    pub archive_path: PathBuf,
    /// Where the record document was written.
    pub record_path: PathBuf,
    /// Whether `latest.json` was replaced.
    pub latest_updated: bool,
}

/// Errors raised while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No current stable version is known.
    #[error(
        "no stable release found in {location}; pass the current stable version explicitly \
         (for a first release use 0.0.0)"
    )]
    NoBaseVersion {
        /// The store that was searched.
        location: String,
    },

    /// Version allocation failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// The metadata store rejected a read or write.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The release tree could not be packaged.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// The record or pointer is invalid.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Release tags could not be read from git.
    #[error("cannot read release tags: {0}")]
    Tags(#[source] GitError),

    /// Git integration failed after the release was written.
    #[error("release {version} was published but git integration failed: {source}")]
    Git {
        /// The published version.
        version: Version,
        /// The git failure.
        #[source]
        source: GitError,
    },

    /// A local file operation failed.
    #[error("publish I/O error at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Publishes release trees into a [`DirectoryStore`].
pub struct Publisher<'a> {
    store: &'a DirectoryStore,
    git: Option<&'a GitRepo<'a>>,
    clock: fn() -> DateTime<Utc>,
}

impl<'a> Publisher<'a> {
    /// Publish into `store`.
    #[must_use]
    pub fn new(store: &'a DirectoryStore) -> Self {
        Self {
            store,
            git: None,
            clock: Utc::now,
        }
    }

    /// Also consult the repository's tags when allocating, and commit and
    /// tag each publish.
    #[must_use]
    pub fn with_git(mut self, git: &'a GitRepo<'a>) -> Self {
        self.git = Some(git);
        self
    }

    /// Replace the clock used for release timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Compute the version a publish would take, without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the store or git cannot be read, no
    /// base version is known, or allocation fails.
    pub fn plan(&self, request: &PublishRequest) -> Result<PublishPlan, PublishError> {
        let existing = self.existing_versions()?;
        let base = match request.current_stable {
            Some(base) => base,
            None => self.current_stable(&existing)?,
        };
        log::debug!(
            "allocating from {base} with {} existing versions",
            existing.len()
        );
        Ok(allocate(base, request.bump, request.prerelease, &existing)?)
    }

    /// Allocate, package and publish.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] on any failure. A
    /// [`MetadataError::AlreadyPublished`] means another publish claimed the
    /// version first; nothing was replaced. When packaging or the record
    /// write fails, the release tree's version marker is put back as it was.
    pub fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PublishError> {
        let plan = self.plan(request)?;
        let version = plan.version;
        let marker = request.source_dir.join(VERSION_MARKER);
        let previous = read_marker(&marker)?;
        fs::write(&marker, version.bare()).map_err(|source| io_error(&marker, source))?;

        let name = ArtifactName::new(request.product.as_str(), version);
        let claimed = match self.claim(request, &name) {
            Ok(claimed) => claimed,
            Err(err) => {
                restore_marker(&marker, previous.as_deref());
                return Err(err);
            }
        };
        let Claimed {
            record,
            record_path,
            packaged,
            _scratch,
        } = claimed;
        let archive_path = self.store.root().join(name.filename());
        fs::rename(&packaged, &archive_path).map_err(|source| io_error(&archive_path, source))?;

        if plan.updates_latest {
            self.promote(&record, request)?;
        }
        if let Some(git) = self.git {
            git.commit_marker(&marker, &version)
                .and_then(|()| git.tag(&version))
                .map_err(|source| PublishError::Git { version, source })?;
        }

        log::info!("published {plan}");
        Ok(PublishOutcome {
            plan,
            record,
            archive_path,
            record_path,
            latest_updated: plan.updates_latest,
        })
    }

    /// Package the tree and win the conditional record write. Until this
    /// succeeds the version is not taken.
    fn claim(
        &self,
        request: &PublishRequest,
        name: &ArtifactName,
    ) -> Result<Claimed, PublishError> {
        let root = self.store.root();
        fs::create_dir_all(root).map_err(|source| io_error(root, source))?;
        let scratch = tempfile::Builder::new()
            .prefix(".keel-publish-")
            .tempdir_in(root)
            .map_err(|source| io_error(root, source))?;
        let packaged = package_release(&request.source_dir, scratch.path(), name)?;

        let record = ReleaseRecord::published(
            *name.version(),
            name.url_under(&request.base_url),
            packaged.sha256,
            (self.clock)(),
            packaged.size_bytes,
        );
        let record_path = self.store.put_release(&record)?;
        Ok(Claimed {
            record,
            record_path,
            packaged: packaged.archive_path,
            _scratch: scratch,
        })
    }

    fn promote(
        &self,
        record: &ReleaseRecord,
        request: &PublishRequest,
    ) -> Result<(), PublishError> {
        let pointer = LatestPointer::new(
            record.clone(),
            join_url(&request.base_url, INSTALL_SCRIPT_NAME),
        )?;
        self.store.put_latest(&pointer)?;
        if let Some(script) = &request.install_script {
            self.store.put_install_script(script)?;
        }
        Ok(())
    }

    fn existing_versions(&self) -> Result<Vec<Version>, PublishError> {
        let mut versions = self.store.list_versions()?;
        if let Some(git) = self.git {
            let tags = git.release_tags().map_err(PublishError::Tags)?;
            versions.extend(tags);
            versions.sort();
            versions.dedup();
        }
        Ok(versions)
    }

    fn current_stable(&self, existing: &[Version]) -> Result<Version, PublishError> {
        if let Some(pointer) = self.store.latest_pointer()? {
            return Ok(*pointer.record().version());
        }
        newest_stable(existing).ok_or_else(|| PublishError::NoBaseVersion {
            location: self.store.root().display().to_string(),
        })
    }
}

/// A version whose record write has won; the archive still sits in the
/// scratch directory.
struct Claimed {
    record: ReleaseRecord,
    record_path: PathBuf,
    packaged: PathBuf,
    _scratch: TempDir,
}

fn read_marker(marker: &Path) -> Result<Option<Vec<u8>>, PublishError> {
    match fs::read(marker) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(marker, e)),
    }
}

/// Put back the marker a failed publish overwrote.
fn restore_marker(marker: &Path, previous: Option<&[u8]>) {
    let restored = match previous {
        Some(contents) => fs::write(marker, contents),
        None => fs::remove_file(marker),
    };
    if let Err(err) = restored {
        log::warn!("could not restore {}: {err}", marker.display());
    }
}

fn io_error(path: &Path, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
