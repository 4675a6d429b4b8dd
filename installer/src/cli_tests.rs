//! Tests for CLI parsing and flag layering.

use super::*;
use crate::config::InstallSettings;
use clap::error::ErrorKind;
use rstest::rstest;
use std::path::PathBuf;

fn v(tag: &str) -> Version {
    tag.parse().expect("valid tag")
}

fn configured() -> Settings {
    Settings {
        install: InstallSettings {
            metadata_url: Some("https://downloads.example.test/keel".to_owned()),
            ..InstallSettings::default()
        },
        ..Settings::default()
    }
}

#[test]
fn install_cli_parses_defaults() {
    let cli = InstallCli::parse_from(["keel-install"]);
    assert_eq!(cli.version, VersionRequest::Latest);
    assert!(cli.target.is_none());
    assert!(cli.install_dir.is_none());
    assert!(!cli.require_checksum);
    assert!(!cli.dry_run);
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
}

#[rstest]
#[case::latest("latest", VersionRequest::Latest)]
#[case::latest_any_case("LATEST", VersionRequest::Latest)]
#[case::stable("v0.1.7", VersionRequest::Explicit(Version::new(0, 1, 7)))]
#[case::bare_prerelease(
    "0.1.7b2",
    VersionRequest::Explicit(Version::prerelease(0, 1, 7, 2).expect("valid"))
)]
fn install_cli_parses_version(#[case] arg: &str, #[case] expected: VersionRequest) {
    let cli = InstallCli::parse_from(["keel-install", arg]);
    assert_eq!(cli.version, expected);
}

#[test]
fn install_cli_parses_remote_target() {
    let cli = InstallCli::parse_from([
        "keel-install",
        "v0.1.7",
        "root@appliance",
        "-d",
        "/srv/keel",
    ]);
    assert_eq!(cli.target.as_deref(), Some("root@appliance"));
    assert_eq!(cli.install_dir, Some(Utf8PathBuf::from("/srv/keel")));
}

#[rstest]
#[case::malformed_version(&["keel-install", "v0.1"], ErrorKind::ValueValidation)]
#[case::zero_prerelease(&["keel-install", "v0.1.7b0"], ErrorKind::ValueValidation)]
#[case::quiet_and_verbose(&["keel-install", "-q", "-v"], ErrorKind::ArgumentConflict)]
#[case::unknown_flag(&["keel-install", "--force"], ErrorKind::UnknownArgument)]
fn install_cli_rejects_invalid_input(#[case] args: &[&str], #[case] kind: ErrorKind) {
    let err = InstallCli::try_parse_from(args).expect_err("invalid input");
    assert_eq!(err.kind(), kind);
}

#[test]
fn install_cli_counts_verbosity() {
    let cli = InstallCli::parse_from(["keel-install", "-vv"]);
    assert_eq!(cli.verbosity, 2);
}

#[test]
fn install_flags_override_settings() {
    let cli = InstallCli::parse_from([
        "keel-install",
        "--metadata-url",
        "/srv/releases",
        "--install-dir",
        "/srv/keel",
        "--timeout",
        "5",
        "--require-checksum",
        "--post-install",
        "./scripts/start.sh",
    ]);

    let config = cli.install_config(&configured()).expect("config");

    assert_eq!(config.metadata_url, "/srv/releases");
    assert_eq!(config.artifact_base_url, "file:///srv/releases");
    assert_eq!(config.transaction.install_dir, PathBuf::from("/srv/keel"));
    assert_eq!(config.timeout.as_secs(), 5);
    assert!(config.transaction.policy.require_checksum());
    assert_eq!(config.post_install.as_deref(), Some("./scripts/start.sh"));
    assert!(config.remote.is_none());
}

#[test]
fn install_config_keeps_settings_when_no_flags_given() {
    let cli = InstallCli::parse_from(["keel-install", "--dry-run", "-q"]);
    let settings = configured();

    let config = cli.install_config(&settings).expect("config");

    assert_eq!(
        config.metadata_url,
        settings.install.metadata_url.as_deref().expect("set")
    );
    assert_eq!(config.transaction.install_dir, PathBuf::from("/opt/keel"));
    assert!(config.dry_run);
    assert!(config.quiet);
}

#[test]
fn install_config_requires_a_metadata_location() {
    let cli = InstallCli::parse_from(["keel-install"]);
    let err = cli
        .install_config(&Settings::default())
        .expect_err("no location");
    assert!(matches!(err, ConfigError::Missing { .. }));
}

#[test]
fn release_cli_parses_defaults() {
    let cli = ReleaseCli::parse_from(["keel-release"]);
    assert_eq!(cli.bump, BumpKind::Patch);
    assert!(!cli.prerelease);
    assert_eq!(cli.source, Utf8PathBuf::from("."));
    assert!(!cli.git);
    assert!(cli.current.is_none());
}

#[rstest]
#[case::minor("minor", BumpKind::Minor)]
#[case::major("MAJOR", BumpKind::Major)]
fn release_cli_parses_bump(#[case] arg: &str, #[case] expected: BumpKind) {
    let cli = ReleaseCli::parse_from(["keel-release", "--bump", arg]);
    assert_eq!(cli.bump, expected);
}

#[test]
fn release_cli_rejects_unknown_bump() {
    let err = ReleaseCli::try_parse_from(["keel-release", "--bump", "micro"]).expect_err("invalid");
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn release_flags_build_publish_request() {
    let cli = ReleaseCli::parse_from([
        "keel-release",
        "--prerelease",
        "--source",
        "/work/keel",
        "--store",
        "/srv/releases",
        "--base-url",
        "https://downloads.example.test/keel",
        "--current",
        "v0.1.6",
        "--product",
        "keel-edge",
    ]);

    let (store, request) = cli.publish_request(&Settings::default()).expect("request");

    assert_eq!(store, PathBuf::from("/srv/releases"));
    assert_eq!(request.product, "keel-edge");
    assert_eq!(request.source_dir, PathBuf::from("/work/keel"));
    assert_eq!(request.current_stable, Some(v("v0.1.6")));
    assert!(request.prerelease);
    assert!(request.install_script.is_none());
}

#[test]
fn release_request_needs_store_and_base_url() {
    let cli = ReleaseCli::parse_from(["keel-release", "--store", "/srv/releases"]);
    let err = cli
        .publish_request(&Settings::default())
        .expect_err("no base url");
    assert!(err.to_string().contains("--base-url"));
}
