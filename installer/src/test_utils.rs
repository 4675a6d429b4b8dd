//! Shared test utilities for the installer crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::artefact::download::{FetchedArchive, UrlFetcher, fetch_archive};
use crate::exec::{CommandExecutor, ExecError};
use crate::release::naming::{ArtifactName, INSTALL_SCRIPT_NAME, join_url, record_filename};
use crate::release::record::{LatestPointer, ReleaseRecord};
use crate::release::sha256_digest::Sha256Digest;
use crate::release::version::Version;
use chrono::{DateTime, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Placeholder digest used in hand-written record documents.
pub const PLACEHOLDER_DIGEST: &str =
    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Base URL used in hand-written record documents.
pub const EXAMPLE_BASE_URL: &str = "https://downloads.example.test/keel";

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn success_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "ssh").
    pub cmd: String,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output, ExecError>,
}

impl ExpectedCall {
    /// Expect `cmd args...` and answer with `result`.
    #[must_use]
    pub fn new(cmd: &str, args: &[&str], result: Result<Output, ExecError>) -> Self {
        Self {
            cmd: cmd.to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            result,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output, ExecError> {
        let mut expected = self.expected.borrow_mut();
        let call = expected
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command invocation: {cmd} {args:?}"));

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args, args);

        call.result
    }
}

/// Fixed release timestamp used by fixtures.
#[must_use]
pub fn fixture_release_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Build a complete `<version>.json` document with a placeholder digest.
#[must_use]
pub fn record_json(bare_version: &str) -> String {
    let prerelease = bare_version.contains('b');
    format!(
        concat!(
            r#"{{"version":"{version}","url":"{base}/keel-{version}.tar.gz","#,
            r#""sha256":"{digest}","releaseDate":"2026-03-01T12:00:00Z","#,
            r#""isPrerelease":{pre},"fileSize":2048}}"#
        ),
        version = bare_version,
        base = EXAMPLE_BASE_URL,
        digest = PLACEHOLDER_DIGEST,
        pre = prerelease,
    )
}

/// Build a `latest.json` document pointing at `bare_version`.
#[must_use]
pub fn latest_json(bare_version: &str) -> String {
    let record = record_json(bare_version);
    let body = record.trim_end_matches('}');
    format!(r#"{body},"installScript":"{EXAMPLE_BASE_URL}/install.sh"}}"#)
}

/// Build an in-memory `.tar.gz` archive from `(path, contents)` pairs.
///
/// # Panics
///
/// Panics if the archive cannot be assembled in memory.
#[must_use]
pub fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data.as_bytes())
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Build a well-formed release archive for `version`.
#[must_use]
pub fn release_archive(version: &Version) -> Vec<u8> {
    let bare = version.bare();
    tar_gz(&[
        ("VERSION", bare.as_str()),
        ("scripts/start.sh", "#!/bin/sh\necho started\n"),
        ("config/keel.conf", "port = 8080\n"),
        ("docs/README", "keel\n"),
    ])
}

/// Build a release archive whose version marker is missing.
#[must_use]
pub fn archive_without_marker() -> Vec<u8> {
    tar_gz(&[
        ("scripts/start.sh", "#!/bin/sh\n"),
        ("config/keel.conf", "port = 8080\n"),
    ])
}

/// Publish `archive` for `version` into a local release directory, writing
/// the archive and its `<version>.json` record. Returns the record.
///
/// # Panics
///
/// Panics if the files cannot be written.
pub fn publish_fixture(root: &Path, version: &Version, archive: &[u8]) -> ReleaseRecord {
    let name = ArtifactName::new("keel", *version);
    let archive_path = root.join(name.filename());
    std::fs::create_dir_all(root).expect("create release dir");
    std::fs::write(&archive_path, archive).expect("write archive");
    let record = ReleaseRecord::published(
        *version,
        name.url_under(&file_url(root)),
        Sha256Digest::of_bytes(archive),
        fixture_release_date(),
        archive.len() as u64,
    );
    let json = serde_json::to_string_pretty(&record).expect("serialise record");
    std::fs::write(root.join(record_filename(version)), json).expect("write record");
    record
}

/// Point `latest.json` in a local release directory at `record`.
///
/// # Panics
///
/// Panics if the record is a prerelease or the file cannot be written.
pub fn point_latest(root: &Path, record: &ReleaseRecord) {
    let pointer = LatestPointer::new(
        record.clone(),
        join_url(&file_url(root), INSTALL_SCRIPT_NAME),
    )
    .expect("stable record");
    let json = serde_json::to_string_pretty(&pointer).expect("serialise pointer");
    std::fs::write(root.join("latest.json"), json).expect("write latest");
}

/// Return the `file://` URL of a local directory.
#[must_use]
pub fn file_url(root: &Path) -> String {
    format!("file://{}", root.display())
}

/// Materialise `bytes` as a [`FetchedArchive`], as if just downloaded.
///
/// # Panics
///
/// Panics if the temporary files cannot be written.
#[must_use]
pub fn fetched_archive(bytes: &[u8]) -> FetchedArchive {
    let source = tempfile::tempdir().expect("temp dir");
    let path = source.path().join("keel-download.tar.gz");
    std::fs::write(&path, bytes).expect("write archive");
    fetch_archive(&UrlFetcher::default(), &file_url(&path)).expect("fetch local archive")
}
