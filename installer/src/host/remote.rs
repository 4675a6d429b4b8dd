//! Install target reached over `ssh`.
//!
//! Every operation is a single non-interactive `ssh` invocation
//! (`BatchMode=yes`, so a missing key fails fast instead of prompting).
//! Paths are shell-quoted because the remote side always goes through a
//! shell. The archive is copied with `scp` into a `mktemp` file and removed
//! again by [`TargetHost::release_staged`].

use super::{HostError, PermissionReport, TargetHost, command_in, quote_path};
use crate::exec::{CommandExecutor, failure_message};
use std::path::{Path, PathBuf};
use std::process::Output;

const BATCH_MODE: &str = "BatchMode=yes";

/// Exit status `test` uses for "false".
const TEST_FALSE: i32 = 1;

/// A remote host addressed by an ssh destination such as `root@appliance`.
pub struct RemoteHost {
    destination: String,
    executor: Box<dyn CommandExecutor>,
}

impl RemoteHost {
    /// Create a host for `destination` driven through `executor`.
    #[must_use]
    pub fn new(destination: impl Into<String>, executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            destination: destination.into(),
            executor,
        }
    }

    fn ssh(&self, script: &str) -> Result<Output, HostError> {
        Ok(self
            .executor
            .run("ssh", &["-o", BATCH_MODE, "--", &self.destination, script])?)
    }

    fn ssh_checked(&self, operation: &'static str, script: &str) -> Result<Output, HostError> {
        let output = self.ssh(script)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(self.command_error(operation, &output))
        }
    }

    fn command_error(&self, operation: &'static str, output: &Output) -> HostError {
        HostError::Command {
            host: self.destination.clone(),
            operation,
            message: failure_message(output),
        }
    }
}

impl TargetHost for RemoteHost {
    fn describe(&self) -> String {
        self.destination.clone()
    }

    fn exists(&self, path: &Path) -> Result<bool, HostError> {
        let output = self.ssh(&format!("test -e {}", quote_path(path)))?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(TEST_FALSE) => Ok(false),
            _ => Err(self.command_error("inspect", &output)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), HostError> {
        self.ssh_checked(
            "rename",
            &format!("mv -- {} {}", quote_path(from), quote_path(to)),
        )?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), HostError> {
        self.ssh_checked("create directory", &format!("mkdir -p -- {}", quote_path(path)))?;
        Ok(())
    }

    fn stage_archive(&self, local: &Path) -> Result<PathBuf, HostError> {
        let output = self.ssh_checked("stage archive", "mktemp -t keel-stage.XXXXXX")?;
        let remote = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if remote.is_empty() {
            return Err(self.command_error("stage archive", &output));
        }
        let local_arg = local.display().to_string();
        let target = format!("{}:{remote}", self.destination);
        let copied = self
            .executor
            .run("scp", &["-B", "-q", "-o", BATCH_MODE, "--", &local_arg, &target])?;
        let staged = PathBuf::from(remote);
        if !copied.status.success() {
            let err = self.command_error("copy archive", &copied);
            if let Err(cleanup) = self.release_staged(&staged) {
                log::warn!(
                    "could not remove {} on {}: {cleanup}",
                    staged.display(),
                    self.destination
                );
            }
            return Err(err);
        }
        Ok(staged)
    }

    fn extract(&self, staged: &Path, dest: &Path) -> Result<(), HostError> {
        self.ssh_checked(
            "extract archive",
            &format!("tar -xzf {} -C {}", quote_path(staged), quote_path(dest)),
        )?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        let quoted = quote_path(path);
        let output = self.ssh(&format!("test -f {quoted} || exit 1; cat -- {quoted} || exit 2"))?;
        match output.status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned())),
            Some(TEST_FALSE) => Ok(None),
            _ => Err(self.command_error("read", &output)),
        }
    }

    fn mark_executable(&self, dir: &Path) -> Result<PermissionReport, HostError> {
        let quoted = quote_path(dir);
        let script = format!(
            "test -d {quoted} || exit 0; find {quoted} -type f -exec chmod a+x {{}} + ; \
             status=$?; find {quoted} -type f | wc -l; exit $status"
        );
        let output = self.ssh(&script)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let updated = stdout.trim().parse().unwrap_or(0);
        let mut report = PermissionReport {
            updated,
            failures: Vec::new(),
        };
        if !output.status.success() {
            report.failures.push(failure_message(&output));
        }
        Ok(report)
    }

    fn run_in(&self, dir: &Path, command: &str) -> Result<(), HostError> {
        self.ssh_checked("post-install hook", &command_in(dir, command))?;
        Ok(())
    }

    fn release_staged(&self, staged: &Path) -> Result<(), HostError> {
        self.ssh_checked("remove staged archive", &format!("rm -f -- {}", quote_path(staged)))?;
        Ok(())
    }
}
