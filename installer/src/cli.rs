//! CLI argument definitions for the keel binaries.
//!
//! `keel-install` installs a release onto the local machine or a remote
//! host; `keel-release` allocates, packages and publishes one. Flags are the
//! last configuration layer: they override `keel.toml` and the environment.

use crate::config::{ConfigError, Settings};
use crate::install_flow::InstallConfig;
use crate::publish::PublishRequest;
use crate::release::version::{BumpKind, Version};
use crate::resolution::{LATEST, VersionRequest};
use camino::Utf8PathBuf;
use clap::Parser;

/// Install a keel release.
#[derive(Parser, Debug)]
#[command(name = "keel-install")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install a keel release.\n\n",
    "The version is resolved against the release metadata store, the archive ",
    "is downloaded and checked against its published SHA-256, and the release ",
    "is unpacked into the install directory. An existing installation is moved ",
    "aside to <dir>.backup.<timestamp> first and is never deleted.\n\n",
    "With a TARGET the install runs on that host over ssh.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Install the newest stable release locally:\n",
    "    $ keel-install\n\n",
    "  Install a prerelease on a remote host:\n",
    "    $ keel-install v0.1.7b2 root@appliance\n\n",
    "  Show what would be installed:\n",
    "    $ keel-install --dry-run\n\n",
    "ENVIRONMENT:\n",
    "  KEEL_METADATA_URL   metadata store location\n",
    "  KEEL_INSTALL_DIR    install directory",
))]
pub struct InstallCli {
    /// Version to install: `latest` or a tag such as `v0.1.7` or `v0.1.7b2`.
    #[arg(id = "version_request", value_name = "VERSION", default_value = LATEST)]
    pub version: VersionRequest,

    /// ssh destination of a remote target, for example `root@appliance`.
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Install directory on the target.
    #[arg(short = 'd', long, value_name = "DIR")]
    pub install_dir: Option<Utf8PathBuf>,

    /// Metadata store location (URL or directory).
    #[arg(long, value_name = "URL")]
    pub metadata_url: Option<String>,

    /// Base URL for artifacts without a metadata record.
    #[arg(long, value_name = "URL")]
    pub artifact_base_url: Option<String>,

    /// Lower-trust release list consulted when the store cannot answer `latest`.
    #[arg(long, value_name = "URL")]
    pub secondary_url: Option<String>,

    /// Refuse to install anything that cannot be checksum-verified.
    #[arg(long)]
    pub require_checksum: bool,

    /// Command run in the new install directory after a successful install.
    #[arg(long, value_name = "COMMAND")]
    pub post_install: Option<String>,

    /// Resolve the version and exit without downloading.
    #[arg(long)]
    pub dry_run: bool,

    /// Configuration file [default: platform config dir/keel.toml].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Network timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (warnings and errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl InstallCli {
    /// Apply flag overrides to `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        let install = &mut settings.install;
        if let Some(dir) = &self.install_dir {
            install.install_dir = dir.clone().into_std_path_buf();
        }
        if let Some(url) = &self.metadata_url {
            install.metadata_url = Some(url.clone());
        }
        if let Some(url) = &self.artifact_base_url {
            install.artifact_base_url = Some(url.clone());
        }
        if let Some(url) = &self.secondary_url {
            install.secondary_url = Some(url.clone());
        }
        if let Some(command) = &self.post_install {
            install.post_install = Some(command.clone());
        }
        if let Some(timeout) = self.timeout {
            install.timeout_secs = timeout;
        }
        install.require_checksum |= self.require_checksum;
    }

    /// Build the run configuration from `settings` and these flags.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no metadata location is set.
    pub fn install_config(&self, settings: &Settings) -> Result<InstallConfig, ConfigError> {
        let mut settings = settings.clone();
        self.apply_to(&mut settings);
        let mut config =
            InstallConfig::from_settings(&settings, self.version, self.target.clone())?;
        config.dry_run = self.dry_run;
        config.quiet = self.quiet;
        Ok(config)
    }
}

/// Allocate, package and publish a keel release.
#[derive(Parser, Debug)]
#[command(name = "keel-release")]
#[command(version, about)]
#[command(long_about = concat!(
    "Allocate, package and publish a keel release.\n\n",
    "The next version is derived from the current stable release and every ",
    "version already published or tagged. Stable releases move the latest ",
    "pointer; prereleases never do.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Publish the next patch release:\n",
    "    $ keel-release --store /srv/releases --base-url https://downloads.example.test/keel\n\n",
    "  Publish the next beta of a minor release and tag it:\n",
    "    $ keel-release --bump minor --prerelease --git\n\n",
    "  Show the allocation only:\n",
    "    $ keel-release --dry-run",
))]
pub struct ReleaseCli {
    /// Which version component to bump.
    #[arg(long, value_name = "KIND", default_value = "patch")]
    pub bump: BumpKind,

    /// Publish the next prerelease of the bumped version.
    #[arg(long)]
    pub prerelease: bool,

    /// Release tree to package.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub source: Utf8PathBuf,

    /// Release store directory.
    #[arg(long, value_name = "DIR")]
    pub store: Option<Utf8PathBuf>,

    /// Public URL under which the store directory is served.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Current stable version, when the store has none yet.
    #[arg(long, value_name = "VERSION")]
    pub current: Option<Version>,

    /// Script published as the generic install entry point.
    #[arg(long, value_name = "FILE")]
    pub install_script: Option<Utf8PathBuf>,

    /// Read existing tags from, and commit and tag the release in, the
    /// source tree's git repository.
    #[arg(long)]
    pub git: bool,

    /// Show the allocated version and exit without publishing.
    #[arg(long)]
    pub dry_run: bool,

    /// Product name used in artifact file names.
    #[arg(long, value_name = "NAME")]
    pub product: Option<String>,

    /// Configuration file [default: platform config dir/keel.toml].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl ReleaseCli {
    /// Apply flag overrides to `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(product) = &self.product {
            settings.product.clone_from(product);
        }
        let publish = &mut settings.publish;
        if let Some(store) = &self.store {
            publish.store_dir = Some(store.clone().into_std_path_buf());
        }
        if let Some(url) = &self.base_url {
            publish.base_url = Some(url.clone());
        }
        if let Some(script) = &self.install_script {
            publish.install_script = Some(script.clone().into_std_path_buf());
        }
    }

    /// Build the publish request and store directory from `settings` and
    /// these flags.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPublish`] when the store directory or
    /// base URL is unset.
    pub fn publish_request(
        &self,
        settings: &Settings,
    ) -> Result<(std::path::PathBuf, PublishRequest), ConfigError> {
        let mut settings = settings.clone();
        self.apply_to(&mut settings);
        let publish = &settings.publish;
        let store_dir = publish.require_store_dir()?.to_path_buf();
        let request = PublishRequest {
            product: settings.product.clone(),
            source_dir: self.source.clone().into_std_path_buf(),
            base_url: publish.require_base_url()?.to_owned(),
            bump: self.bump,
            prerelease: self.prerelease,
            current_stable: self.current,
            install_script: publish.install_script.clone(),
        };
        Ok((store_dir, request))
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
