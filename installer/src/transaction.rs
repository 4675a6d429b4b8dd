//! Install transaction: apply a fetched archive to a target directory.
//!
//! The transaction walks a fixed sequence of states:
//!
//! ```text
//! Fetched → Verified → Staged → BackedUp → Extracted → Validated → Permissioned → Committed
//! ```
//!
//! Any failure before `Committed` moves to `Aborted`. An existing
//! installation is renamed to `<dir>.backup.<timestamp>` before anything
//! destructive happens and is never deleted or restored automatically; the
//! abort error names the backup and the command that restores it.

use crate::artefact::download::FetchedArchive;
use crate::artefact::verification::{
    IntegrityError, VerificationOutcome, VerificationPolicy, verify_checksum,
};
use crate::host::{HostError, TargetHost, quote_path};
use crate::release::record::ReleaseRecord;
use crate::release::version::Version;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::fmt;
use std::path::{Path, PathBuf};

/// The version marker file at the top of every release archive.
pub const VERSION_MARKER: &str = "VERSION";

/// Top-level entries every release archive must contain.
pub const DEFAULT_REQUIRED_ENTRIES: &[&str] = &[VERSION_MARKER, "scripts", "config"];

/// Directories whose files receive executable bits.
pub const DEFAULT_EXECUTABLE_DIRS: &[&str] = &["scripts", "bin"];

/// Backup suffix timestamp format (UTC, microsecond resolution).
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6fZ";

/// States of an install transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// The archive has been downloaded.
    Fetched,
    /// The archive passed (or was allowed to skip) integrity verification.
    Verified,
    /// The archive is available on the target host.
    Staged,
    /// Any existing installation has been renamed aside.
    BackedUp,
    /// The archive has been unpacked into a fresh install directory.
    Extracted,
    /// The required entries and version marker are present.
    Validated,
    /// Executable bits have been applied (best effort).
    Permissioned,
    /// The install succeeded.
    Committed,
    /// The install failed; see the accompanying error.
    Aborted,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetched => "fetched",
            Self::Verified => "verified",
            Self::Staged => "staged",
            Self::BackedUp => "backed-up",
            Self::Extracted => "extracted",
            Self::Validated => "validated",
            Self::Permissioned => "permissioned",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Immutable settings for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    /// The installation directory on the target.
    pub install_dir: PathBuf,
    /// Entries that must exist at the top of the extracted tree.
    pub required_entries: Vec<String>,
    /// Directories whose files are made executable.
    pub executable_dirs: Vec<String>,
    /// Whether unverified archives may be installed.
    pub policy: VerificationPolicy,
}

impl TransactionConfig {
    /// Settings with the default layout for `install_dir`.
    #[must_use]
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            required_entries: to_owned_list(DEFAULT_REQUIRED_ENTRIES),
            executable_dirs: to_owned_list(DEFAULT_EXECUTABLE_DIRS),
            policy: VerificationPolicy::default(),
        }
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

/// Why a transaction aborted.
#[derive(Debug, thiserror::Error)]
pub enum AbortCause {
    /// The archive failed verification and was discarded.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// The archive has no expected digest and the policy requires one.
    #[error(
        "refusing to install {version} without a published checksum; \
         publish its metadata record or drop --require-checksum"
    )]
    UnverifiedRefused {
        /// The version that could not be verified.
        version: Version,
    },

    /// The install directory has no final component to derive a backup
    /// name from.
    #[error("install directory {0} cannot be backed up; choose a named directory")]
    InvalidInstallDir(PathBuf),

    /// The computed backup path is already taken.
    #[error(
        "backup path {0} already exists; refusing to overwrite an earlier backup, \
         wait a moment and retry"
    )]
    BackupCollision(PathBuf),

    /// Required entries are missing after extraction.
    #[error("archive is corrupt: missing {}", .0.join(", "))]
    CorruptArchive(Vec<String>),

    /// The version marker does not name the resolved version.
    #[error("archive is corrupt: VERSION contains {found:?}, expected {expected:?}")]
    MarkerMismatch {
        /// The resolved bare version.
        expected: String,
        /// The marker contents.
        found: String,
    },

    /// A host operation failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// A failed transaction, with everything an operator needs to recover.
#[derive(Debug, thiserror::Error)]
#[error(
    "install aborted after stage {stage}: {cause}{}",
    recovery_hint(.install_dir, .backup.as_deref(), .partial)
)]
pub struct TransactionError {
    /// The last state reached before the failure.
    pub stage: InstallState,
    /// What went wrong.
    #[source]
    pub cause: AbortCause,
    /// The install directory.
    pub install_dir: PathBuf,
    /// Where the previous installation was moved, if it existed.
    pub backup: Option<PathBuf>,
    /// True when a new, incomplete install directory was left in place.
    pub partial: bool,
}

impl TransactionError {
    /// Return the shell command that restores the previous installation.
    #[must_use]
    pub fn restore_command(&self) -> Option<String> {
        self.backup
            .as_deref()
            .map(|backup| restore_command(&self.install_dir, backup))
    }
}

fn restore_command(install_dir: &Path, backup: &Path) -> String {
    format!("mv -- {} {}", quote_path(backup), quote_path(install_dir))
}

fn recovery_hint(install_dir: &Path, backup: Option<&Path>, partial: &bool) -> String {
    let mut hint = String::new();
    if *partial {
        hint.push_str(&format!(
            "; {} holds an incomplete install and must be removed before restoring",
            install_dir.display()
        ));
    }
    match backup {
        Some(backup) => hint.push_str(&format!(
            "; the previous installation is intact at {}; restore it with: {}",
            backup.display(),
            restore_command(install_dir, backup)
        )),
        None if *partial => hint.push_str("; there was no previous installation"),
        None => hint.push_str("; nothing on the target was changed"),
    }
    hint
}

/// Summary of a committed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// The installed version.
    pub version: Version,
    /// The target description.
    pub host: String,
    /// The installation directory.
    pub install_dir: PathBuf,
    /// Where the previous installation was moved, if any.
    pub backup: Option<PathBuf>,
    /// True when the archive was checksum-verified.
    pub verified: bool,
    /// Non-fatal problems encountered along the way.
    pub warnings: Vec<String>,
}

/// Compute the backup path for `install_dir` at `now`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use keel_installer::transaction::backup_path;
/// use std::path::Path;
///
/// let now = Utc
///     .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
///     .single()
///     .expect("valid timestamp");
/// let backup = backup_path(Path::new("/opt/keel"), now).expect("named directory");
/// assert_eq!(backup, Path::new("/opt/keel.backup.20260301T120000000000Z"));
/// ```
#[must_use]
pub fn backup_path(install_dir: &Path, now: DateTime<Utc>) -> Option<PathBuf> {
    let name = install_dir.file_name()?;
    let mut backup_name = name.to_os_string();
    backup_name.push(format!(".backup.{}", now.format(BACKUP_TIMESTAMP_FORMAT)));
    Some(install_dir.with_file_name(backup_name))
}

/// Applies one fetched archive to one target.
pub struct InstallTransaction<'a> {
    host: &'a dyn TargetHost,
    config: &'a TransactionConfig,
    clock: fn() -> DateTime<Utc>,
    state: InstallState,
    backup: Option<PathBuf>,
    created_dir: bool,
    warnings: Vec<String>,
}

impl<'a> InstallTransaction<'a> {
    /// Start a transaction against `host` using `config`.
    #[must_use]
    pub fn new(host: &'a dyn TargetHost, config: &'a TransactionConfig) -> Self {
        Self {
            host,
            config,
            clock: Utc::now,
            state: InstallState::Fetched,
            backup: None,
            created_dir: false,
            warnings: Vec::new(),
        }
    }

    /// Replace the clock used for backup timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Return the current state.
    #[must_use]
    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Verify, stage, back up, extract, validate and permission `archive`
    /// as the installation of `record`.
    ///
    /// The local archive and any staged copy on the target are removed on
    /// every exit path; an archive failing verification is discarded before
    /// anything on the target is touched.
    ///
    /// # Errors
    ///
    /// Returns a [`TransactionError`] describing the stage reached, the
    /// preserved backup and any partial directory.
    pub fn apply(
        mut self,
        archive: FetchedArchive,
        record: &ReleaseRecord,
    ) -> Result<InstallReport, TransactionError> {
        let verified = match self.verify(&archive, record) {
            Ok(verified) => verified,
            Err(cause) => {
                archive.discard();
                return Err(self.abort(cause));
            }
        };
        self.advance(InstallState::Verified);

        let staged = match self.host.stage_archive(archive.path()) {
            Ok(staged) => staged,
            Err(err) => return Err(self.abort(err.into())),
        };
        self.advance(InstallState::Staged);

        let outcome = self.apply_staged(&staged, record);
        if let Err(err) = self.host.release_staged(&staged) {
            self.warn(format!(
                "could not remove staged archive {}: {err}",
                staged.display()
            ));
        }
        archive.discard();
        if let Err(cause) = outcome {
            return Err(self.abort(cause));
        }

        self.advance(InstallState::Committed);
        info!(
            "installed {} into {} on {}",
            record.version(),
            self.config.install_dir.display(),
            self.host.describe()
        );
        Ok(InstallReport {
            version: *record.version(),
            host: self.host.describe(),
            install_dir: self.config.install_dir.clone(),
            backup: self.backup,
            verified,
            warnings: self.warnings,
        })
    }

    fn verify(
        &mut self,
        archive: &FetchedArchive,
        record: &ReleaseRecord,
    ) -> Result<bool, AbortCause> {
        match verify_checksum(archive.path(), record.sha256(), record.size_bytes())? {
            VerificationOutcome::Verified { .. } => Ok(true),
            VerificationOutcome::Unverified { actual } => {
                if self.config.policy.require_checksum() {
                    return Err(AbortCause::UnverifiedRefused {
                        version: *record.version(),
                    });
                }
                self.warn(format!(
                    "{} has no published checksum and was installed unverified (sha256 {actual})",
                    record.version()
                ));
                Ok(false)
            }
        }
    }

    fn apply_staged(&mut self, staged: &Path, record: &ReleaseRecord) -> Result<(), AbortCause> {
        let install_dir = self.config.install_dir.clone();
        self.back_up(&install_dir)?;
        self.advance(InstallState::BackedUp);

        self.host.create_dir_all(&install_dir)?;
        self.created_dir = true;
        self.host.extract(staged, &install_dir)?;
        self.advance(InstallState::Extracted);

        self.validate(&install_dir, record.version())?;
        self.advance(InstallState::Validated);

        self.set_permissions(&install_dir);
        self.advance(InstallState::Permissioned);
        Ok(())
    }

    fn back_up(&mut self, install_dir: &Path) -> Result<(), AbortCause> {
        if !self.host.exists(install_dir)? {
            debug!("no existing installation at {}", install_dir.display());
            return Ok(());
        }
        let backup = backup_path(install_dir, (self.clock)())
            .ok_or_else(|| AbortCause::InvalidInstallDir(install_dir.to_path_buf()))?;
        if self.host.exists(&backup)? {
            return Err(AbortCause::BackupCollision(backup));
        }
        self.host.rename(install_dir, &backup)?;
        info!(
            "moved previous installation {} to {}",
            install_dir.display(),
            backup.display()
        );
        self.backup = Some(backup);
        Ok(())
    }

    fn validate(&self, install_dir: &Path, version: &Version) -> Result<(), AbortCause> {
        let mut missing = Vec::new();
        for entry in &self.config.required_entries {
            if !self.host.exists(&install_dir.join(entry))? {
                missing.push(entry.clone());
            }
        }
        if !missing.is_empty() {
            return Err(AbortCause::CorruptArchive(missing));
        }

        let marker = install_dir.join(VERSION_MARKER);
        let Some(contents) = self.host.read_file(&marker)? else {
            return Err(AbortCause::CorruptArchive(vec![VERSION_MARKER.to_owned()]));
        };
        let expected = version.bare();
        if contents.trim() != expected {
            return Err(AbortCause::MarkerMismatch {
                expected,
                found: contents.trim().to_owned(),
            });
        }
        Ok(())
    }

    fn set_permissions(&mut self, install_dir: &Path) {
        let dirs = self.config.executable_dirs.clone();
        for dir in dirs {
            let path = install_dir.join(&dir);
            match self.host.mark_executable(&path) {
                Ok(report) => {
                    debug!(
                        "made {} files executable under {}",
                        report.updated,
                        path.display()
                    );
                    for failure in report.failures {
                        self.warn(format!("could not set executable bit: {failure}"));
                    }
                }
                Err(err) => self.warn(format!(
                    "could not set executable bits under {}: {err}",
                    path.display()
                )),
            }
        }
    }

    fn advance(&mut self, next: InstallState) {
        debug!("install transaction {} -> {next}", self.state);
        self.state = next;
    }

    fn warn(&mut self, message: String) {
        debug!("warning: {message}");
        self.warnings.push(message);
    }

    fn abort(&mut self, cause: AbortCause) -> TransactionError {
        let stage = self.state;
        self.state = InstallState::Aborted;
        let error = TransactionError {
            stage,
            cause,
            install_dir: self.config.install_dir.clone(),
            backup: self.backup.clone(),
            partial: self.created_dir,
        };
        debug!("{error}");
        error
    }
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
