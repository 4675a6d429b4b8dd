//! Terminal logging for the keel binaries.
//!
//! Diagnostics go through the `log` facade and are rendered on stderr by
//! `simplelog`. Operator-facing output (warnings, summaries) is written
//! separately via [`crate::output`], so the default level only lets
//! through problems the library could not report any other way.

use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

/// Map the `-v`/`-q` flags to a log level.
///
/// # Example
///
/// ```
/// use keel_installer::logging::level_for;
/// use simplelog::LevelFilter;
///
/// assert_eq!(level_for(0, false), LevelFilter::Warn);
/// assert_eq!(level_for(2, false), LevelFilter::Debug);
/// assert_eq!(level_for(2, true), LevelFilter::Error);
/// ```
#[must_use]
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the terminal logger.
///
/// Only records from this crate are shown. Calling this twice is harmless;
/// the second logger is discarded.
pub fn init_logging(verbosity: u8, quiet: bool) {
    let config = ConfigBuilder::new()
        .add_filter_allow_str("keel_installer")
        .set_time_level(LevelFilter::Off)
        .build();
    if TermLogger::init(
        level_for(verbosity, quiet),
        config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .is_err()
    {
        // A logger is already installed.
    }
}
