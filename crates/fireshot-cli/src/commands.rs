//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fireshot: screenshot the asset application's FIRE views against a mocked backend
///
/// Without a subcommand, runs the `fire` plan against http://localhost:5174/asset/.
#[derive(Parser, Debug)]
#[command(name = "fireshot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Output format for reports and listings
    #[arg(long, default_value = "text", global = true)]
    pub format: FormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for the default `run`
    #[command(flatten)]
    pub run: RunArgs,
}

impl Cli {
    /// Arguments of the run to perform, if the command is a run
    #[must_use]
    pub fn run_args(&self) -> Option<&RunArgs> {
        match self.command {
            Some(Commands::Run(ref args)) => Some(args),
            None => Some(&self.run),
            Some(_) => None,
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a verification plan (default)
    Run(RunArgs),

    /// List built-in plans
    Plans,

    /// Print a plan as YAML
    ShowPlan(ShowPlanArgs),

    /// Print a mock payload as JSON
    Fixture(FixtureArgs),
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Built-in plan to run
    #[arg(short, long, env = "FIRESHOT_PLAN", default_value = "fire")]
    pub plan: String,

    /// Load the plan from a YAML file instead
    #[arg(long, conflicts_with = "plan")]
    pub plan_file: Option<PathBuf>,

    /// Application root the plan navigates under
    #[arg(long, env = "FIRESHOT_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory screenshots are written to
    #[arg(short, long, env = "FIRESHOT_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Chromium binary (auto-detected when omitted)
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Override the plan's settle policy with a fixed delay
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Write the JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Exit 0 whatever the outcome
    #[arg(long)]
    pub lenient: bool,
}

/// Arguments for the show-plan command
#[derive(Args, Debug)]
pub struct ShowPlanArgs {
    /// Built-in plan name
    #[arg(default_value = "fire")]
    pub plan: String,

    /// Application root the plan navigates under
    #[arg(long, env = "FIRESHOT_BASE_URL")]
    pub base_url: Option<String>,
}

/// Arguments for the fixture command
#[derive(Args, Debug)]
pub struct FixtureArgs {
    /// Payload name
    #[arg(default_value = "fire")]
    pub name: String,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}
