//! keel release publisher.
//!
//! Allocates the next version, writes the version marker, packages the
//! release tree into the store and, for stable releases, moves the latest
//! pointer.

use clap::Parser;
use keel_installer::cli::ReleaseCli;
use keel_installer::config::Settings;
use keel_installer::dirs::SystemBaseDirs;
use keel_installer::error::Result;
use keel_installer::exec::SystemCommandExecutor;
use keel_installer::git::GitRepo;
use keel_installer::logging::init_logging;
use keel_installer::metadata::directory::DirectoryStore;
use keel_installer::output::{publish_summary, write_stderr_line};
use keel_installer::publish::Publisher;
use std::io::Write;

fn main() {
    let mut stderr = std::io::stderr();
    let cli = match ReleaseCli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if err.print().is_err() {
                // Best-effort output; ignore write failures.
            }
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };
    init_logging(cli.verbosity, cli.quiet);
    let exit_code = match run(&cli, &mut stderr) {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(&mut stderr, format!("error: {err}"));
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &ReleaseCli, stderr: &mut dyn Write) -> Result<()> {
    let settings = Settings::load(
        cli.config.as_deref().map(camino::Utf8Path::as_std_path),
        &SystemBaseDirs,
    )?;
    let (store_dir, request) = cli.publish_request(&settings)?;
    let store = DirectoryStore::new(store_dir);
    let executor = SystemCommandExecutor::default();
    let git = GitRepo::new(&request.source_dir, &executor);
    let mut publisher = Publisher::new(&store);
    if cli.git {
        publisher = publisher.with_git(&git);
    }

    if cli.dry_run {
        let plan = publisher.plan(&request)?;
        write_stderr_line(stderr, format!("Would publish {plan}"));
        return Ok(());
    }

    let outcome = publisher.publish(&request)?;
    if !cli.quiet {
        write_stderr_line(stderr, publish_summary(&outcome));
    }
    Ok(())
}
