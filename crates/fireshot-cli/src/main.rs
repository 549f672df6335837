//! Fireshot CLI: screenshot the asset application's FIRE views
//!
//! ## Usage
//!
//! ```bash
//! fireshot                              # fire plan against localhost:5174
//! fireshot --plan cash-flow -o shots    # another built-in plan
//! fireshot show-plan fire > fire.yaml   # dump a plan, edit it
//! fireshot run --plan-file fire.yaml    # run the edited plan
//! ```

use clap::Parser;
use fireshot_cli::{
    build_config, init_logging, list_plans, run_verification, show_fixture, show_plan, Cli,
    CliResult, Commands,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<u8> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(&config);

    match cli.command {
        None => run_verification(&config, &cli.run),
        Some(Commands::Run(ref args)) => run_verification(&config, args),
        Some(Commands::Plans) => list_plans(&config).map(|()| 0),
        Some(Commands::ShowPlan(ref args)) => show_plan(&config, args).map(|()| 0),
        Some(Commands::Fixture(ref args)) => show_fixture(args).map(|()| 0),
    }
}
