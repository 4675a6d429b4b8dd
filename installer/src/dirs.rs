//! Directory resolution abstraction for platform-specific paths.
//!
//! The configuration file lives in the platform configuration directory
//! (`~/.config/keel/keel.toml` on Linux). The [`BaseDirs`] trait lets tests
//! substitute their own locations.

use std::path::PathBuf;

/// File name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "keel.toml";

/// Provides platform-specific base directories.
pub trait BaseDirs {
    /// Return the user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Return the keel configuration directory.
    fn config_dir(&self) -> Option<PathBuf>;

    /// Return the default configuration file path.
    fn config_file(&self) -> Option<PathBuf> {
        self.config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }
}

/// [`BaseDirs`] backed by `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }

    fn config_dir(&self) -> Option<PathBuf> {
        directories_next::ProjectDirs::from("", "", "keel")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDirs(Option<PathBuf>);

    impl BaseDirs for FixedDirs {
        fn home_dir(&self) -> Option<PathBuf> {
            None
        }

        fn config_dir(&self) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    #[test]
    fn config_file_lives_in_config_dir() {
        let dirs = FixedDirs(Some(PathBuf::from("/home/op/.config/keel")));
        assert_eq!(
            dirs.config_file(),
            Some(PathBuf::from("/home/op/.config/keel/keel.toml"))
        );
        assert_eq!(FixedDirs(None).config_file(), None);
    }
}
