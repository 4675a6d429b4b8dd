//! Output formatting for the keel CLIs.
//!
//! Everything user-facing goes to stderr one line at a time; write failures
//! are ignored so a closed pipe never turns a successful install into an
//! error.

use crate::publish::PublishOutcome;
use crate::resolution::{Resolution, ResolutionSource};
use crate::transaction::InstallReport;
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Write each warning on its own `warning:` line.
pub fn write_warnings(stderr: &mut dyn Write, warnings: &[String]) {
    for warning in warnings {
        write_stderr_line(stderr, format!("warning: {warning}"));
    }
}

/// Format a success message after installation.
///
/// # Example
///
/// ```
/// use keel_installer::output::success_message;
/// use keel_installer::transaction::InstallReport;
/// use std::path::PathBuf;
///
/// let report = InstallReport {
///     version: "v0.1.7".parse().expect("valid tag"),
///     host: "local host".to_owned(),
///     install_dir: PathBuf::from("/opt/keel"),
///     backup: None,
///     verified: true,
///     warnings: Vec::new(),
/// };
/// assert_eq!(
///     success_message(&report),
///     "Installed v0.1.7 to /opt/keel on local host"
/// );
/// ```
#[must_use]
pub fn success_message(report: &InstallReport) -> String {
    let mut message = format!(
        "Installed {} to {} on {}",
        report.version,
        report.install_dir.display(),
        report.host
    );
    if !report.verified {
        message.push_str(" (integrity NOT verified)");
    }
    if let Some(backup) = &report.backup {
        message.push_str(&format!(
            "\nPrevious installation kept at {}",
            backup.display()
        ));
    }
    message
}

/// What a dry-run install would do.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// The resolved release.
    pub resolution: &'a Resolution,
    /// The target description.
    pub host: &'a str,
    /// The installation directory.
    pub install_dir: &'a Path,
    /// The post-install command, if configured.
    pub post_install: Option<&'a str>,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let record = &self.resolution.record;
        let source = match &self.resolution.source {
            ResolutionSource::Primary(location) => format!("metadata at {location}"),
            ResolutionSource::Secondary(location) => {
                format!("secondary metadata at {location} (lower trust)")
            }
            ResolutionSource::ConventionalUrl => "conventional artifact URL".to_owned(),
        };
        let checksum = record
            .sha256()
            .map_or_else(|| "none (unverified)".to_owned(), ToString::to_string);
        let mut lines = vec![
            "Dry run - nothing will be downloaded or installed".to_owned(),
            String::new(),
            format!("Version: {}", record.version()),
            format!("Resolved from: {source}"),
            format!("Artifact: {}", record.artifact_url()),
            format!("SHA-256: {checksum}"),
            format!("Target: {}", self.host),
            format!("Install directory: {}", self.install_dir.display()),
        ];
        if let Some(command) = self.post_install {
            lines.push(format!("Post-install: {command}"));
        }
        lines.join("\n")
    }
}

/// Format the summary printed after a publish.
#[must_use]
pub fn publish_summary(outcome: &PublishOutcome) -> String {
    let mut lines = vec![
        format!("Published {}", outcome.plan),
        format!("Archive: {}", outcome.archive_path.display()),
        format!("Record: {}", outcome.record_path.display()),
    ];
    if let Some(digest) = outcome.record.sha256() {
        lines.push(format!("SHA-256: {digest}"));
    }
    if outcome.latest_updated {
        lines.push(format!("Latest now points at {}", outcome.plan.version));
    } else {
        lines.push("Latest pointer unchanged".to_owned());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::version::Version;
    use rstest::{fixture, rstest};
    use std::path::PathBuf;

    #[fixture]
    fn report() -> InstallReport {
        InstallReport {
            version: "v0.1.7".parse::<Version>().expect("valid tag"),
            host: "deploy@appliance".to_owned(),
            install_dir: PathBuf::from("/opt/keel"),
            backup: None,
            verified: true,
            warnings: Vec::new(),
        }
    }

    #[rstest]
    fn success_message_names_version_and_target(report: InstallReport) {
        let msg = success_message(&report);
        assert!(msg.contains("v0.1.7"));
        assert!(msg.contains("deploy@appliance"));
        assert!(!msg.contains("NOT verified"));
    }

    #[rstest]
    fn success_message_flags_unverified_installs_and_backups(mut report: InstallReport) {
        report.verified = false;
        report.backup = Some(PathBuf::from("/opt/keel.backup.20260301T120000000000Z"));
        let msg = success_message(&report);
        assert!(msg.contains("integrity NOT verified"));
        assert!(msg.contains("Previous installation kept at /opt/keel.backup."));
    }

    #[test]
    fn warnings_are_prefixed() {
        let mut stderr = Vec::new();
        write_warnings(&mut stderr, &["first".to_owned(), "second".to_owned()]);
        let text = String::from_utf8(stderr).expect("utf-8");
        assert_eq!(text, "warning: first\nwarning: second\n");
    }
}
