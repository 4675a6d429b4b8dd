//! End-to-end install: resolve, fetch, apply, then run the post-install hook.
//!
//! [`run_install`] takes its collaborators through [`InstallContext`] so the
//! same flow drives local and remote targets and can be exercised in tests
//! against local directories. [`SystemServices`] builds the production
//! collaborators from an [`InstallConfig`].

use crate::artefact::download::{ArchiveFetcher, UrlFetcher, fetch_archive};
use crate::artefact::verification::VerificationPolicy;
use crate::config::{ConfigError, Settings};
use crate::error::{InstallerError, Result};
use crate::exec::SystemCommandExecutor;
use crate::host::local::LocalHost;
use crate::host::remote::RemoteHost;
use crate::host::TargetHost;
use crate::lock::HostLock;
use crate::metadata::github::GithubReleaseStore;
use crate::metadata::{MetadataStore, store_for_location};
use crate::output::{DryRunInfo, success_message, write_stderr_line, write_warnings};
use crate::resolution::{Resolution, VersionRequest, VersionResolver};
use crate::transaction::{InstallReport, InstallTransaction, TransactionConfig};
use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

const FILE_SCHEME: &str = "file://";

/// Immutable settings for one install run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    /// Product name used in artifact file names.
    pub product: String,
    /// The requested version.
    pub request: VersionRequest,
    /// Location of the primary metadata store.
    pub metadata_url: String,
    /// Base URL for conventional artifact URLs.
    pub artifact_base_url: String,
    /// Lower-trust release list consulted for `latest`.
    pub secondary_url: Option<String>,
    /// ssh destination of a remote target; `None` installs locally.
    pub remote: Option<String>,
    /// Settings for the install transaction.
    pub transaction: TransactionConfig,
    /// Network and command timeout.
    pub timeout: Duration,
    /// Command run in the new install directory after commit.
    pub post_install: Option<String>,
    /// Resolve only; touch nothing.
    pub dry_run: bool,
    /// Suppress progress lines. Warnings are still shown.
    pub quiet: bool,
}

impl InstallConfig {
    /// Build the run configuration from loaded settings.
    ///
    /// The artifact base defaults to the metadata location; bare directory
    /// paths become `file://` URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no metadata location is set.
    pub fn from_settings(
        settings: &Settings,
        request: VersionRequest,
        remote: Option<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let install = &settings.install;
        let metadata_url = install.require_metadata_url()?.to_owned();
        let artifact_base_url = install
            .artifact_base_url
            .clone()
            .unwrap_or_else(|| location_url(&metadata_url));
        let transaction = TransactionConfig {
            install_dir: install.install_dir.clone(),
            required_entries: install.required_entries.clone(),
            executable_dirs: install.executable_dirs.clone(),
            policy: VerificationPolicy::requiring_checksum(install.require_checksum),
        };
        Ok(Self {
            product: settings.product.clone(),
            request,
            metadata_url,
            artifact_base_url,
            secondary_url: install.secondary_url.clone(),
            remote,
            transaction,
            timeout: Duration::from_secs(install.timeout_secs),
            post_install: install.post_install.clone(),
            dry_run: false,
            quiet: false,
        })
    }
}

/// Collaborators used by [`run_install`].
#[derive(Clone, Copy)]
pub struct InstallContext<'a> {
    /// The primary metadata store.
    pub primary: &'a dyn MetadataStore,
    /// The lower-trust store consulted for `latest`.
    pub secondary: Option<&'a dyn MetadataStore>,
    /// Downloads the artifact.
    pub fetcher: &'a dyn ArchiveFetcher,
    /// The install target.
    pub host: &'a dyn TargetHost,
}

/// Production collaborators for a configuration.
pub struct SystemServices {
    primary: Box<dyn MetadataStore>,
    secondary: Option<Box<dyn MetadataStore>>,
    fetcher: UrlFetcher,
    host: Box<dyn TargetHost>,
}

impl SystemServices {
    /// Build stores, fetcher and host for `config`.
    #[must_use]
    pub fn for_config(config: &InstallConfig) -> Self {
        let secondary = config.secondary_url.as_ref().map(|url| {
            Box::new(GithubReleaseStore::new(
                url.as_str(),
                config.product.as_str(),
                Box::new(UrlFetcher::new(config.timeout)),
            )) as Box<dyn MetadataStore>
        });
        let executor = Box::new(SystemCommandExecutor::default());
        let host: Box<dyn TargetHost> = match &config.remote {
            Some(destination) => Box::new(RemoteHost::new(destination.as_str(), executor)),
            None => Box::new(LocalHost::new(executor)),
        };
        Self {
            primary: store_for_location(&config.metadata_url, config.timeout),
            secondary,
            fetcher: UrlFetcher::new(config.timeout),
            host,
        }
    }

    /// Borrow the collaborators.
    #[must_use]
    pub fn context(&self) -> InstallContext<'_> {
        InstallContext {
            primary: self.primary.as_ref(),
            secondary: self.secondary.as_deref(),
            fetcher: &self.fetcher,
            host: self.host.as_ref(),
        }
    }
}

/// What an install run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Only resolution ran.
    DryRun(Resolution),
    /// The release was installed.
    Installed(InstallReport),
}

/// Resolve, fetch and install `config.request` on `context.host`.
///
/// Warnings are always written to `stderr`; progress lines are suppressed
/// by `config.quiet`. Local installs hold the install lock for the whole
/// transaction and the post-install hook.
///
/// # Errors
///
/// Returns [`InstallerError`] for any resolution, download, lock or
/// transaction failure, and [`InstallerError::PostInstall`] when the hook
/// fails after the install committed.
pub fn run_install(
    config: &InstallConfig,
    context: &InstallContext<'_>,
    stderr: &mut dyn Write,
) -> Result<InstallOutcome> {
    let mut resolver =
        VersionResolver::new(context.primary, &config.product, &config.artifact_base_url)
            .with_policy(config.transaction.policy);
    if let Some(secondary) = context.secondary {
        resolver = resolver.with_secondary(secondary);
    }
    let resolution = resolver.resolve(config.request)?;
    write_warnings(stderr, &resolution.warnings);

    if config.dry_run {
        let host = context.host.describe();
        let info = DryRunInfo {
            resolution: &resolution,
            host: &host,
            install_dir: &config.transaction.install_dir,
            post_install: config.post_install.as_deref(),
        };
        write_stderr_line(stderr, info.display_text());
        return Ok(InstallOutcome::DryRun(resolution));
    }

    let _lock = match config.remote {
        Some(_) => None,
        None => Some(HostLock::acquire(&config.transaction.install_dir)?),
    };

    let record = &resolution.record;
    let url = record.artifact_url();
    if !config.quiet {
        write_stderr_line(stderr, format!("Downloading {} from {url}...", record.version()));
    }
    let archive = fetch_archive(context.fetcher, url)
        .map_err(|err| InstallerError::from_fetch(*record.version(), url, err))?;

    if !config.quiet {
        write_stderr_line(
            stderr,
            format!(
                "Installing into {} on {}...",
                config.transaction.install_dir.display(),
                context.host.describe()
            ),
        );
    }
    let report = InstallTransaction::new(context.host, &config.transaction).apply(archive, record)?;
    write_warnings(stderr, &report.warnings);

    if let Some(command) = &config.post_install {
        run_post_install(context.host, &report, command)?;
    }

    if !config.quiet {
        write_stderr_line(stderr, success_message(&report));
    }
    Ok(InstallOutcome::Installed(report))
}

fn run_post_install(host: &dyn TargetHost, report: &InstallReport, command: &str) -> Result<()> {
    info!(
        "running post-install hook in {}: {command}",
        report.install_dir.display()
    );
    host.run_in(&report.install_dir, command)
        .map_err(|source| InstallerError::PostInstall {
            version: report.version,
            install_dir: report.install_dir.clone(),
            source,
        })
}

/// Turn a store location into a URL: URLs pass through, paths become
/// absolute `file://` URLs.
#[must_use]
pub fn location_url(location: &str) -> String {
    if location.contains("://") {
        return location.to_owned();
    }
    let path = std::path::absolute(location).unwrap_or_else(|_| PathBuf::from(location));
    format!("{FILE_SCHEME}{}", path.display())
}

#[cfg(test)]
#[path = "install_flow_tests.rs"]
mod tests;
