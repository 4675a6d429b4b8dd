//! Metadata store on a local directory.
//!
//! Uses the same layout as the HTTP store (`latest.json`, `<version>.json`,
//! archives and `install.sh` side by side), which makes a directory usable
//! both as a `file://` mirror for installs and as the publish side's
//! staging area before upload.

use super::{LATEST_DOCUMENT, MetadataError, MetadataStore, StoreTrust, malformed};
use crate::release::naming::{INSTALL_SCRIPT_NAME, record_filename};
use crate::release::record::{LatestPointer, ReleaseRecord, parse_latest, parse_record};
use crate::release::version::Version;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A release directory holding metadata documents and artifacts.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Create a store rooted at `root`. The directory need not exist yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Return the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the latest-stable pointer, returning `None` before the first
    /// stable publish.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Malformed`] for an invalid pointer and
    /// [`MetadataError::Io`] for read failures.
    pub fn latest_pointer(&self) -> Result<Option<LatestPointer>, MetadataError> {
        let path = self.root.join(LATEST_DOCUMENT);
        let Some(body) = read_optional(&path)? else {
            return Ok(None);
        };
        parse_latest(&body)
            .map(Some)
            .map_err(|e| malformed(&path.display().to_string(), &e))
    }

    /// List every version with a record document, in ascending order.
    ///
    /// Files that do not parse as `<version>.json` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] if the directory cannot be read. A
    /// missing directory yields an empty list.
    pub fn list_versions(&self) -> Result<Vec<Version>, MetadataError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            match stem.parse::<Version>() {
                Ok(version) => versions.push(version),
                Err(_) if name == LATEST_DOCUMENT => {}
                Err(err) => log::debug!("ignoring {}: {err}", entry.path().display()),
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Write the record for a newly published version.
    ///
    /// The write is conditional: records are immutable, so an existing
    /// document for the same version is never replaced. Two publishers that
    /// allocate the same version from a stale view therefore cannot both
    /// succeed.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::AlreadyPublished`] if a record for the
    /// version exists and [`MetadataError::Io`] on write failures.
    pub fn put_release(&self, record: &ReleaseRecord) -> Result<PathBuf, MetadataError> {
        let path = self.root.join(record_filename(record.version()));
        let json = to_json(&path, record)?;
        let staged = self.stage(&json)?;
        staged.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                MetadataError::AlreadyPublished {
                    location: path.display().to_string(),
                }
            } else {
                io_error(&path, e.error)
            }
        })?;
        log::info!("wrote release record {}", path.display());
        Ok(path)
    }

    /// Atomically replace the latest-stable pointer.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] on write failures.
    pub fn put_latest(&self, pointer: &LatestPointer) -> Result<PathBuf, MetadataError> {
        let path = self.root.join(LATEST_DOCUMENT);
        let json = to_json(&path, pointer)?;
        self.replace(&path, json.as_bytes())?;
        log::info!(
            "latest pointer now references {}",
            pointer.record().version()
        );
        Ok(path)
    }

    /// Atomically replace the generic install entry point with `script`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Io`] if `script` cannot be read or the copy
    /// cannot be written.
    pub fn put_install_script(&self, script: &Path) -> Result<PathBuf, MetadataError> {
        let contents = fs::read(script).map_err(|e| io_error(script, e))?;
        let path = self.root.join(INSTALL_SCRIPT_NAME);
        self.replace(&path, &contents)?;
        Ok(path)
    }

    fn replace(&self, path: &Path, contents: &[u8]) -> Result<(), MetadataError> {
        let staged = self.stage(contents)?;
        staged
            .persist(path)
            .map_err(|e| io_error(path, e.error))?;
        Ok(())
    }

    fn stage(&self, contents: impl AsRef<[u8]>) -> Result<NamedTempFile, MetadataError> {
        fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut staged =
            NamedTempFile::new_in(&self.root).map_err(|e| io_error(&self.root, e))?;
        staged
            .write_all(contents.as_ref())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| io_error(staged.path(), e))?;
        Ok(staged)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, MetadataError> {
    match fs::read_to_string(path) {
        Ok(body) => Ok(Some(body)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, source: io::Error) -> MetadataError {
    MetadataError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn to_json(path: &Path, value: &impl serde::Serialize) -> Result<String, MetadataError> {
    serde_json::to_string_pretty(value).map_err(|e| malformed(&path.display().to_string(), &e))
}

impl MetadataStore for DirectoryStore {
    fn latest(&self) -> Result<ReleaseRecord, MetadataError> {
        self.latest_pointer()?
            .map(LatestPointer::into_record)
            .ok_or_else(|| MetadataError::Missing {
                location: self.root.join(LATEST_DOCUMENT).display().to_string(),
            })
    }

    fn release(&self, version: &Version) -> Result<Option<ReleaseRecord>, MetadataError> {
        let path = self.root.join(record_filename(version));
        let Some(body) = read_optional(&path)? else {
            return Ok(None);
        };
        parse_record(&body)
            .map(Some)
            .map_err(|e| malformed(&path.display().to_string(), &e))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn trust(&self) -> StoreTrust {
        StoreTrust::Primary
    }
}
