//! Configuration file and environment overrides.
//!
//! Settings come from three layers, later layers winning: the optional
//! `keel.toml` file, the `KEEL_METADATA_URL` / `KEEL_INSTALL_DIR`
//! environment variables, and command-line flags. The binaries merge the
//! layers once and hand the result to each component as an immutable value.
//!
//! ```toml
//! product = "keel"
//!
//! [install]
//! metadata_url = "https://downloads.example.test/keel"
//! install_dir = "/opt/keel"
//! require_checksum = true
//!
//! [publish]
//! store_dir = "dist/releases"
//! base_url = "https://downloads.example.test/keel"
//! ```

use crate::dirs::BaseDirs;
use crate::transaction::{DEFAULT_EXECUTABLE_DIRS, DEFAULT_REQUIRED_ENTRIES};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the metadata store location.
pub const METADATA_URL_ENV: &str = "KEEL_METADATA_URL";

/// Environment variable overriding the install directory.
pub const INSTALL_DIR_ENV: &str = "KEEL_INSTALL_DIR";

/// Default product name.
pub const DEFAULT_PRODUCT: &str = "keel";

/// Default install directory on the target host.
pub const DEFAULT_INSTALL_DIR: &str = "/opt/keel";

/// Default network timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration file {path}: {source}")]
    Parse {
        /// The file path.
        path: PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A required setting has no value in any layer.
    #[error("no {setting} configured; set it in keel.toml, via {env}, or with --{flag}")]
    Missing {
        /// The setting name.
        setting: &'static str,
        /// The environment variable that can provide it.
        env: &'static str,
        /// The command-line flag that can provide it.
        flag: &'static str,
    },

    /// A required publish setting has no value.
    #[error("no {setting} configured; set `{key}` in keel.toml or pass --{flag}")]
    MissingPublish {
        /// The setting name.
        setting: &'static str,
        /// The key in the `[publish]` table.
        key: &'static str,
        /// The command-line flag that can provide it.
        flag: &'static str,
    },
}

/// Settings loaded from `keel.toml` and the environment.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Product name used in artifact file names.
    pub product: String,
    /// Install-side settings.
    pub install: InstallSettings,
    /// Publish-side settings.
    pub publish: PublishSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_owned(),
            install: InstallSettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

/// The `[install]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallSettings {
    /// Location of the primary metadata store (URL or directory).
    pub metadata_url: Option<String>,
    /// Base URL for conventional artifact URLs; defaults to the metadata
    /// location.
    pub artifact_base_url: Option<String>,
    /// GitHub-style release API consulted when the primary store cannot
    /// answer `latest`.
    pub secondary_url: Option<String>,
    /// Install directory on the target host.
    pub install_dir: PathBuf,
    /// Refuse to install anything that cannot be checksum-verified.
    pub require_checksum: bool,
    /// Network timeout in seconds.
    pub timeout_secs: u64,
    /// Command run in the new install directory after a successful install.
    pub post_install: Option<String>,
    /// Top-level entries a valid release must contain.
    pub required_entries: Vec<String>,
    /// Directories whose files are made executable.
    pub executable_dirs: Vec<String>,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            metadata_url: None,
            artifact_base_url: None,
            secondary_url: None,
            install_dir: PathBuf::from(DEFAULT_INSTALL_DIR),
            require_checksum: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            post_install: None,
            required_entries: to_owned_list(DEFAULT_REQUIRED_ENTRIES),
            executable_dirs: to_owned_list(DEFAULT_EXECUTABLE_DIRS),
        }
    }
}

impl InstallSettings {
    /// Return the metadata location or explain how to set one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no layer provides it.
    pub fn require_metadata_url(&self) -> Result<&str, ConfigError> {
        self.metadata_url.as_deref().ok_or(ConfigError::Missing {
            setting: "metadata location",
            env: METADATA_URL_ENV,
            flag: "metadata-url",
        })
    }
}

/// The `[publish]` table.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PublishSettings {
    /// Directory the release store is written to.
    pub store_dir: Option<PathBuf>,
    /// Public URL under which `store_dir` is served.
    pub base_url: Option<String>,
    /// Script published as the generic install entry point.
    pub install_script: Option<PathBuf>,
}

impl PublishSettings {
    /// Return the release store directory or explain how to set one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPublish`] when it is unset.
    pub fn require_store_dir(&self) -> Result<&Path, ConfigError> {
        self.store_dir
            .as_deref()
            .ok_or(ConfigError::MissingPublish {
                setting: "release store directory",
                key: "publish.store_dir",
                flag: "store",
            })
    }

    /// Return the public base URL or explain how to set one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPublish`] when it is unset.
    pub fn require_base_url(&self) -> Result<&str, ConfigError> {
        self.base_url
            .as_deref()
            .ok_or(ConfigError::MissingPublish {
                setting: "public base URL",
                key: "publish.base_url",
                flag: "base-url",
            })
    }
}

impl Settings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or unknown keys.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load settings from `explicit`, or from the default location when it
    /// exists, then apply environment overrides.
    ///
    /// An explicitly named file must exist; the default file is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>, dirs: &dyn BaseDirs) -> Result<Self, ConfigError> {
        let mut settings = match explicit {
            Some(path) => Self::read(path)?,
            None => match dirs.config_file().filter(|p| p.is_file()) {
                Some(path) => Self::read(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env();
        settings.install.install_dir = expand_home(&settings.install.install_dir, dirs);
        Ok(settings)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded configuration from {}", path.display());
        Self::from_toml(&text, path)
    }

    /// Apply `KEEL_METADATA_URL` and `KEEL_INSTALL_DIR`. Blank values are
    /// ignored.
    pub fn apply_env(&mut self) {
        if let Some(url) = non_blank_env(METADATA_URL_ENV) {
            self.install.metadata_url = Some(url);
        }
        if let Some(dir) = non_blank_env(INSTALL_DIR_ENV) {
            self.install.install_dir = PathBuf::from(dir);
        }
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &Path, dirs: &dyn BaseDirs) -> PathBuf {
    match (path.strip_prefix("~"), dirs.home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirs::CONFIG_FILE_NAME;
    use rstest::rstest;

    struct TestDirs {
        home: Option<PathBuf>,
        config: Option<PathBuf>,
    }

    impl BaseDirs for TestDirs {
        fn home_dir(&self) -> Option<PathBuf> {
            self.home.clone()
        }

        fn config_dir(&self) -> Option<PathBuf> {
            self.config.clone()
        }
    }

    fn no_dirs() -> TestDirs {
        TestDirs {
            home: None,
            config: None,
        }
    }

    fn without_env<T>(f: impl FnOnce() -> T) -> T {
        temp_env::with_vars_unset([METADATA_URL_ENV, INSTALL_DIR_ENV], f)
    }

    #[rstest]
    fn defaults_match_the_documented_baseline() {
        let settings = Settings::default();
        assert_eq!(settings.product, "keel");
        assert_eq!(settings.install.install_dir, PathBuf::from("/opt/keel"));
        assert_eq!(settings.install.timeout_secs, 30);
        assert_eq!(
            settings.install.required_entries,
            ["VERSION", "scripts", "config"]
        );
        assert!(!settings.install.require_checksum);
    }

    #[rstest]
    fn deserialises_partial_tables() {
        let source = concat!(
            "[install]\n",
            "metadata_url = \"https://downloads.example.test/keel\"\n",
            "require_checksum = true\n",
        );
        let settings = Settings::from_toml(source, Path::new("keel.toml")).expect("valid toml");
        assert_eq!(
            settings.install.metadata_url.as_deref(),
            Some("https://downloads.example.test/keel")
        );
        assert!(settings.install.require_checksum);
        assert_eq!(settings.install.timeout_secs, 30);
        assert_eq!(settings.publish, PublishSettings::default());
    }

    #[rstest]
    #[case::top_level("colour = \"blue\"\n")]
    #[case::install_table("[install]\ninstall_path = \"/opt\"\n")]
    fn unknown_keys_are_rejected(#[case] source: &str) {
        let err = Settings::from_toml(source, Path::new("keel.toml")).expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("keel.toml");
        std::fs::write(
            &path,
            concat!(
                "[install]\n",
                "metadata_url = \"https://file.example.test\"\n",
                "install_dir = \"/srv/keel\"\n",
            ),
        )
        .expect("write config");

        let settings = temp_env::with_vars(
            [
                (METADATA_URL_ENV, Some("https://env.example.test")),
                (INSTALL_DIR_ENV, Some("/data/keel")),
            ],
            || Settings::load(Some(&path), &no_dirs()),
        )
        .expect("load");
        assert_eq!(
            settings.install.metadata_url.as_deref(),
            Some("https://env.example.test")
        );
        assert_eq!(settings.install.install_dir, PathBuf::from("/data/keel"));
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let settings = temp_env::with_var(INSTALL_DIR_ENV, Some("  "), || {
            Settings::load(None, &no_dirs())
        })
        .expect("load");
        assert_eq!(settings.install.install_dir, PathBuf::from(DEFAULT_INSTALL_DIR));
    }

    #[test]
    fn default_file_is_optional_but_used_when_present() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dirs = TestDirs {
            home: Some(PathBuf::from("/home/op")),
            config: Some(dir.path().to_path_buf()),
        };
        let absent = without_env(|| Settings::load(None, &dirs)).expect("no file");
        assert_eq!(absent, Settings::default());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "product = \"keel-edge\"\n[install]\ninstall_dir = \"~/keel\"\n",
        )
        .expect("write config");
        let present = without_env(|| Settings::load(None, &dirs)).expect("file");
        assert_eq!(present.product, "keel-edge");
        assert_eq!(present.install.install_dir, PathBuf::from("/home/op/keel"));
    }

    #[test]
    fn explicit_file_must_exist() {
        let missing = Path::new("/nonexistent/keel.toml");
        let err = without_env(|| Settings::load(Some(missing), &no_dirs()))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn missing_metadata_url_names_every_layer() {
        let err = InstallSettings::default()
            .require_metadata_url()
            .expect_err("unset");
        let message = err.to_string();
        assert!(message.contains("KEEL_METADATA_URL"));
        assert!(message.contains("--metadata-url"));
    }

    #[test]
    fn publish_table_requirements_name_the_key_and_flag() {
        let publish = PublishSettings::default();
        let store = publish.require_store_dir().expect_err("unset").to_string();
        assert!(store.contains("publish.store_dir"));
        assert!(store.contains("--store"));

        let configured = PublishSettings {
            base_url: Some("https://downloads.example.test/keel".to_owned()),
            ..PublishSettings::default()
        };
        assert_eq!(
            configured.require_base_url().expect("set"),
            "https://downloads.example.test/keel"
        );
    }
}
