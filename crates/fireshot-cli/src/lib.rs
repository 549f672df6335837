//! Fireshot CLI library
//!
//! Argument parsing, configuration, logging setup and command handlers
//! behind the `fireshot` binary.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{Cli, ColorArg, Commands, FixtureArgs, FormatArg, RunArgs, ShowPlanArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{render_report, LogWriter, OutputFormat, ProgressReporter};
pub use runner::{browser_config, list_plans, load_plan, run_verification, show_fixture, show_plan};

use tracing_subscriber::EnvFilter;

/// Build the configuration from parsed arguments
#[must_use]
pub fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_format(cli.format.into())
}

/// Install the log subscriber on stderr, around any running spinner;
/// `RUST_LOG` wins over `-v`/`-q`
pub fn init_logging(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.color.should_color())
        .with_writer(LogWriter)
        .try_init();
}
