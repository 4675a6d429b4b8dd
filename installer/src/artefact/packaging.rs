//! Release packaging: build the `.tar.gz` artifact from a source tree.
//!
//! The archive mirrors the source tree with no wrapping directory, so the
//! version marker and the operator script directories sit at the top level
//! of the extracted installation. Entries are appended in sorted order at
//! every level, making the archive layout independent of directory
//! iteration order.

use super::packaging_error::PackagingError;
use super::verification::compute_sha256;
use crate::release::naming::ArtifactName;
use crate::release::sha256_digest::Sha256Digest;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::path::{Path, PathBuf};

/// Output produced by [`package_release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    /// Path to the created `.tar.gz` archive.
    pub archive_path: PathBuf,
    /// SHA-256 digest of the archive.
    pub sha256: Sha256Digest,
    /// Archive size in bytes.
    pub size_bytes: u64,
}

/// Package `source_dir` into `<output_dir>/<name>`.
///
/// # Errors
///
/// Returns [`PackagingError::MissingSource`] or
/// [`PackagingError::EmptySource`] for an unusable source tree,
/// [`PackagingError::OutputInsideSource`] when the archive would include
/// itself, and [`PackagingError::Io`] on I/O failures.
pub fn package_release(
    source_dir: &Path,
    output_dir: &Path,
    name: &ArtifactName,
) -> Result<PackagedArchive, PackagingError> {
    if !source_dir.is_dir() {
        return Err(PackagingError::MissingSource(source_dir.to_path_buf()));
    }
    fs::create_dir_all(output_dir)?;
    let archive_path = output_dir.join(name.filename());
    ensure_outside(source_dir, output_dir, &archive_path)?;

    let entries = collect_entries(source_dir)?;
    if entries.is_empty() {
        return Err(PackagingError::EmptySource(source_dir.to_path_buf()));
    }
    create_archive(&archive_path, &entries)?;

    let sha256 = compute_sha256(&archive_path)?;
    let size_bytes = fs::metadata(&archive_path)?.len();
    log::info!(
        "packaged {} entries into {} ({size_bytes} bytes)",
        entries.len(),
        archive_path.display()
    );
    Ok(PackagedArchive {
        archive_path,
        sha256,
        size_bytes,
    })
}

/// Create a `.tar.gz` archive at `output_path`.
///
/// Each entry is a `(source_path, archive_name)` pair; directories are
/// appended as directory entries without recursion.
///
/// # Errors
///
/// Returns [`PackagingError::Io`] if any source file cannot be read or the
/// output file cannot be written.
pub fn create_archive(
    output_path: &Path,
    entries: &[(PathBuf, PathBuf)],
) -> Result<(), PackagingError> {
    let output_file = fs::File::create(output_path)?;
    let mut archive = tar::Builder::new(GzEncoder::new(output_file, Compression::default()));
    for (source_path, archive_name) in entries {
        archive.append_path_with_name(source_path, archive_name)?;
    }
    archive.into_inner()?.finish()?;
    Ok(())
}

/// Walk `root` depth-first in sorted order, returning
/// `(absolute_path, relative_name)` pairs.
fn collect_entries(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>, PackagingError> {
    let mut out = Vec::new();
    walk_sorted(root, Path::new(""), &mut out)?;
    Ok(out)
}

fn walk_sorted(
    dir: &Path,
    prefix: &Path,
    out: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<(), PackagingError> {
    let mut children = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    children.sort();
    for child in children {
        let Some(file_name) = child.file_name() else {
            continue;
        };
        let relative = prefix.join(file_name);
        let is_dir = child.is_dir();
        out.push((child.clone(), relative.clone()));
        if is_dir {
            walk_sorted(&child, &relative, out)?;
        }
    }
    Ok(())
}

fn ensure_outside(
    source_dir: &Path,
    output_dir: &Path,
    archive_path: &Path,
) -> Result<(), PackagingError> {
    let source = fs::canonicalize(source_dir)?;
    let output = fs::canonicalize(output_dir)?;
    if output.starts_with(&source) {
        return Err(PackagingError::OutputInsideSource {
            archive: archive_path.to_path_buf(),
            source_dir: source_dir.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
