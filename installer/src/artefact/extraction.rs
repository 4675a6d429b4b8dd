//! Archive extraction for release artifacts.
//!
//! Extracts `.tar.gz` archives to a target directory with path traversal
//! protection to prevent zip-slip attacks.

use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive contains no entries")]
    EmptyArchive,
}

/// Extract the gzip-compressed tarball at `archive_path` into `dest_dir`.
///
/// Every entry path, and the target of every link entry, is validated
/// before anything is written. Each entry's parent directory is also
/// resolved on disk, so a chain of links laid down by earlier entries
/// cannot redirect a later entry outside `dest_dir`. Returns the relative
/// paths of the extracted entries in archive order.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
/// escape the destination directory, [`ExtractionError::EmptyArchive`] if
/// the archive has no entries, and [`ExtractionError::Io`] on I/O failures
/// (including a corrupt gzip stream).
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, ExtractionError> {
    let file = std::fs::File::open(archive_path)?;
    std::fs::create_dir_all(dest_dir)?;
    let root = dest_dir.canonicalize()?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    let mut extracted = Vec::new();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;
        if let Some(link) = entry.link_name()? {
            validate_link_target(&entry_path, &link)?;
        }

        ensure_resolves_inside(&root, &entry_path)?;
        if !entry.unpack_in(&root)? {
            return Err(traversal(&entry_path));
        }
        extracted.push(entry_path);
    }

    if extracted.is_empty() {
        return Err(ExtractionError::EmptyArchive);
    }
    log::debug!(
        "extracted {} entries from {} into {}",
        extracted.len(),
        archive_path.display(),
        dest_dir.display()
    );
    Ok(extracted)
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
pub(crate) fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    if path.is_absolute() {
        return Err(traversal(path));
    }
    for component in path.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(traversal(path));
        }
    }
    Ok(())
}

/// Resolve the deepest existing ancestor of `entry`'s parent under `root`
/// and check it has not been redirected outside `root` by a symlink.
fn ensure_resolves_inside(root: &Path, entry: &Path) -> Result<(), ExtractionError> {
    let parent = entry.parent().map_or_else(|| root.to_path_buf(), |p| root.join(p));
    let Some(existing) = parent
        .ancestors()
        .find(|candidate| candidate.symlink_metadata().is_ok())
    else {
        return Ok(());
    };
    let resolved = existing.canonicalize()?;
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(traversal(entry))
    }
}

/// Validate that a link entry resolves inside the destination directory.
fn validate_link_target(entry: &Path, link: &Path) -> Result<(), ExtractionError> {
    if link.is_absolute() {
        return Err(traversal(link));
    }
    let mut depth = entry.components().count().saturating_sub(1);
    for component in link.components() {
        match component {
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(|| traversal(link))?;
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return Err(traversal(link)),
        }
    }
    Ok(())
}

fn traversal(path: &Path) -> ExtractionError {
    ExtractionError::PathTraversal {
        path: path.display().to_string(),
    }
}
