//! Install target on the local machine.

use super::{HostError, PermissionReport, TargetHost, command_in};
use crate::artefact::extraction::extract_tar_gz;
use crate::exec::{CommandExecutor, failure_message};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The local filesystem.
pub struct LocalHost {
    executor: Box<dyn CommandExecutor>,
}

impl LocalHost {
    /// Create a local host that runs hook commands through `executor`.
    #[must_use]
    pub fn new(executor: Box<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

impl TargetHost for LocalHost {
    fn describe(&self) -> String {
        "local".to_owned()
    }

    fn exists(&self, path: &Path) -> Result<bool, HostError> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(HostError::io("inspect", path, e)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), HostError> {
        fs::rename(from, to).map_err(|e| HostError::io("rename", from, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), HostError> {
        fs::create_dir_all(path).map_err(|e| HostError::io("create", path, e))
    }

    fn stage_archive(&self, local: &Path) -> Result<PathBuf, HostError> {
        Ok(local.to_path_buf())
    }

    fn extract(&self, staged: &Path, dest: &Path) -> Result<(), HostError> {
        extract_tar_gz(staged, dest)?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HostError::io("read", path, e)),
        }
    }

    fn mark_executable(&self, dir: &Path) -> Result<PermissionReport, HostError> {
        let mut report = PermissionReport::default();
        if !dir.is_dir() {
            return Ok(report);
        }
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) => {
                    report.failures.push(format!("{}: {e}", current.display()));
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                match entry.file_type() {
                    Ok(kind) if kind.is_dir() => pending.push(path),
                    Ok(kind) if kind.is_file() => match set_executable(&path) {
                        Ok(()) => report.updated += 1,
                        Err(e) => report.failures.push(format!("{}: {e}", path.display())),
                    },
                    Ok(_) => {}
                    Err(e) => report.failures.push(format!("{}: {e}", path.display())),
                }
            }
        }
        Ok(report)
    }

    fn run_in(&self, dir: &Path, command: &str) -> Result<(), HostError> {
        let script = command_in(dir, command);
        let output = self.executor.run("sh", &["-c", &script])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HostError::Command {
                host: self.describe(),
                operation: "post-install hook",
                message: failure_message(&output),
            })
        }
    }

    fn release_staged(&self, _staged: &Path) -> Result<(), HostError> {
        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecError;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};

    fn host_with(calls: Vec<ExpectedCall>) -> LocalHost {
        LocalHost::new(Box::new(StubExecutor::new(calls)))
    }

    #[test]
    fn exists_and_rename() {
        let dir = tempfile::tempdir().expect("temp dir");
        let from = dir.path().join("keel");
        let to = dir.path().join("keel.backup.1");
        let host = host_with(Vec::new());
        host.create_dir_all(&from).expect("mkdir");

        assert!(host.exists(&from).expect("exists"));
        host.rename(&from, &to).expect("rename");
        assert!(!host.exists(&from).expect("exists"));
        assert!(host.exists(&to).expect("exists"));
    }

    #[test]
    fn read_file_distinguishes_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let marker = dir.path().join("VERSION");
        let host = host_with(Vec::new());
        assert_eq!(host.read_file(&marker).expect("read"), None);
        fs::write(&marker, "0.1.7").expect("write");
        assert_eq!(host.read_file(&marker).expect("read").as_deref(), Some("0.1.7"));
    }

    #[cfg(unix)]
    #[test]
    fn mark_executable_sets_bits_recursively() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(scripts.join("lib")).expect("mkdir");
        fs::write(scripts.join("start.sh"), "#!/bin/sh\n").expect("write");
        fs::write(scripts.join("lib/common.sh"), "#!/bin/sh\n").expect("write");

        let report = host_with(Vec::new())
            .mark_executable(&scripts)
            .expect("chmod pass");
        assert_eq!(report.updated, 2);
        assert!(report.failures.is_empty());
        let mode = fs::metadata(scripts.join("lib/common.sh"))
            .expect("stat")
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn mark_executable_ignores_missing_directory() {
        let report = host_with(Vec::new())
            .mark_executable(Path::new("/nonexistent/keel/bin"))
            .expect("no-op");
        assert_eq!(report, PermissionReport::default());
    }

    #[test]
    fn run_in_reports_hook_failure() {
        let host = host_with(vec![ExpectedCall::new(
            "sh",
            &["-c", "cd '/opt/keel' && ./scripts/setup.sh"],
            Ok(failure_output("unit registration failed")),
        )]);
        let err = host
            .run_in(Path::new("/opt/keel"), "./scripts/setup.sh")
            .expect_err("hook fails");
        assert!(err.to_string().contains("unit registration failed"));
    }

    #[test]
    fn run_in_succeeds() {
        let host = host_with(vec![ExpectedCall::new(
            "sh",
            &["-c", "cd '/opt/keel' && true"],
            Ok(success_output("")),
        )]);
        host.run_in(Path::new("/opt/keel"), "true").expect("hook");
    }

    #[test]
    fn run_in_surfaces_spawn_errors() {
        let host = host_with(vec![ExpectedCall::new(
            "sh",
            &["-c", "cd '/opt/keel' && true"],
            Err(ExecError::TimedOut {
                program: "sh".to_owned(),
                seconds: 1,
            }),
        )]);
        let err = host
            .run_in(Path::new("/opt/keel"), "true")
            .expect_err("timeout");
        assert!(matches!(err, HostError::Exec(_)));
    }
}
