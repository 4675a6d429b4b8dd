//! keel installer CLI entrypoint.
//!
//! Resolves the requested version, downloads and verifies the archive, and
//! installs it on the local machine or a remote host over ssh.

use clap::Parser;
use keel_installer::cli::InstallCli;
use keel_installer::config::Settings;
use keel_installer::dirs::SystemBaseDirs;
use keel_installer::error::Result;
use keel_installer::install_flow::{SystemServices, run_install};
use keel_installer::logging::init_logging;
use keel_installer::output::write_stderr_line;
use std::io::Write;

fn main() {
    let mut stderr = std::io::stderr();
    let cli = match InstallCli::try_parse() {
        Ok(cli) => cli,
        Err(err) => std::process::exit(exit_code_for_parse_error(&err)),
    };
    init_logging(cli.verbosity, cli.quiet);
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &InstallCli, stderr: &mut dyn Write) -> Result<()> {
    let settings = Settings::load(
        cli.config.as_deref().map(camino::Utf8Path::as_std_path),
        &SystemBaseDirs,
    )?;
    let config = cli.install_config(&settings)?;
    let services = SystemServices::for_config(&config);
    run_install(&config, &services.context(), stderr)?;
    Ok(())
}

/// Print a clap error and map it to the process exit code: 0 for
/// `--help`/`--version`, 1 for everything else.
fn exit_code_for_parse_error(err: &clap::Error) -> i32 {
    if err.print().is_err() {
        // Best-effort output; ignore write failures.
    }
    if err.use_stderr() { 1 } else { 0 }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}
