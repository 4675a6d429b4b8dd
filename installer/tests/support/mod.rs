//! Test support utilities for installer behavioural tests.
//!
//! A [`ReleaseSite`] is a temporary directory holding a release store, a
//! release tree to publish from and an install target, laid out the way a
//! real deployment would be.

use keel_installer::release::version::Version;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch release store, release tree and install target.
pub struct ReleaseSite {
    dir: TempDir,
}

impl ReleaseSite {
    /// Create a site with an empty store and a minimal release tree.
    pub fn new() -> Self {
        let site = Self {
            dir: TempDir::new().expect("temp dir"),
        };
        let source = site.source_dir();
        fs::create_dir_all(source.join("scripts")).expect("scripts dir");
        fs::create_dir_all(source.join("config")).expect("config dir");
        fs::write(source.join("scripts/start.sh"), "#!/bin/sh\necho started\n").expect("script");
        fs::write(source.join("config/keel.conf"), "port = 8080\n").expect("config");
        site
    }

    /// The release store directory.
    pub fn store_root(&self) -> PathBuf {
        self.dir.path().join("releases")
    }

    /// The release tree that publishes package.
    pub fn source_dir(&self) -> PathBuf {
        self.dir.path().join("release-tree")
    }

    /// The install directory.
    pub fn install_dir(&self) -> PathBuf {
        self.dir.path().join("opt").join("keel")
    }

    /// Return the version marker of the current installation, if any.
    pub fn installed_version(&self) -> Option<String> {
        read_marker(&self.install_dir())
    }

    /// Return every backup directory next to the install directory.
    pub fn backups(&self) -> Vec<PathBuf> {
        let parent = self.dir.path().join("opt");
        let Ok(entries) = fs::read_dir(&parent) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("keel.backup."))
            })
            .collect()
    }
}

/// Read the `VERSION` marker inside `dir`.
pub fn read_marker(dir: &Path) -> Option<String> {
    fs::read_to_string(dir.join("VERSION")).ok()
}

/// Parse a version tag, panicking on invalid test input.
pub fn v(tag: &str) -> Version {
    tag.parse().expect("valid version tag")
}
