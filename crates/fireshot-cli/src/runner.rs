//! Command handlers

use crate::commands::{FixtureArgs, RunArgs, ShowPlanArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use fireshot::{BrowserConfig, PortfolioPayload, SettlePolicy, VerificationPlan, PRESETS};
use serde::Serialize;
use tracing::{debug, info};

/// Resolve the plan a run should execute, with command-line overrides applied
///
/// # Errors
///
/// Returns error for an unknown preset, an unreadable plan file or an
/// invalid base URL
pub fn load_plan(args: &RunArgs) -> CliResult<VerificationPlan> {
    let mut plan = match args.plan_file {
        Some(ref path) => {
            if args.base_url.is_some() {
                return Err(CliError::invalid_argument(
                    "--base-url only applies to built-in plans",
                ));
            }
            VerificationPlan::from_yaml_file(path)?
        }
        None => VerificationPlan::preset(&args.plan, args.base_url.as_deref())?,
    };
    if let Some(ms) = args.settle_ms {
        plan.settle = SettlePolicy::fixed(ms);
    }
    Ok(plan)
}

/// Browser settings from the run flags
#[must_use]
pub fn browser_config(args: &RunArgs) -> BrowserConfig {
    let mut config = BrowserConfig::default().with_headless(!args.headed);
    if args.no_sandbox {
        config = config.with_no_sandbox();
    }
    if let Some(ref path) = args.chromium_path {
        config = config.with_chromium_path(path);
    }
    config
}

/// Run a verification plan in Chromium; returns the process exit code
///
/// # Errors
///
/// Returns error if the plan cannot be loaded, the runtime cannot start or
/// the report cannot be written. Faults during the run itself are part of
/// the report, not errors.
#[cfg(feature = "browser")]
pub fn run_verification(config: &CliConfig, args: &RunArgs) -> CliResult<u8> {
    use crate::output::{render_report, ProgressReporter};
    use fireshot::Harness;

    let plan = load_plan(args)?;
    info!(plan = %plan.name, output = %args.output_dir.display(), "starting run");
    let harness = Harness::new(plan, &args.output_dir).with_browser(browser_config(args));

    let mut reporter = ProgressReporter::new(
        config.color.should_color(),
        config.verbosity.is_quiet(),
    );
    if !config.verbosity.is_verbose() {
        reporter.start_spinner(&format!("running {}", harness.plan().name));
    }
    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(harness.run_with_chromium());
    reporter.finish();

    if let Some(ref path) = args.report {
        std::fs::write(path, report.to_json()?)?;
        debug!(path = %path.display(), "report written");
    }

    match config.format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => {
            if !config.verbosity.is_quiet() {
                println!("{}", render_report(&report, config.color.should_color()));
            }
            reporter.outcome(&report);
        }
    }
    Ok(report.exit_code(args.lenient))
}

/// Without the `browser` feature there is nothing to drive
///
/// # Errors
///
/// Always returns [`CliError::FeatureDisabled`] once the plan has loaded
#[cfg(not(feature = "browser"))]
pub fn run_verification(_config: &CliConfig, args: &RunArgs) -> CliResult<u8> {
    let plan = load_plan(args)?;
    debug!(plan = %plan.name, "browser feature disabled");
    Err(CliError::FeatureDisabled { feature: "browser" })
}

#[derive(Serialize)]
struct PlanSummary {
    name: String,
    description: String,
    artifacts: Vec<String>,
}

/// List the built-in plans
///
/// # Errors
///
/// Returns error if a preset fails to build or JSON output fails
pub fn list_plans(config: &CliConfig) -> CliResult<()> {
    let plans = PRESETS
        .iter()
        .map(|name| {
            let plan = VerificationPlan::preset(name, None)?;
            Ok(PlanSummary {
                name: plan.name.clone(),
                description: plan.description.clone(),
                artifacts: plan.artifact_names().into_iter().map(String::from).collect(),
            })
        })
        .collect::<CliResult<Vec<_>>>()?;

    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
        OutputFormat::Text => {
            for plan in &plans {
                println!("{:<12} {}", plan.name, plan.description);
                println!("{:<12} -> {}", "", plan.artifacts.join(", "));
            }
        }
    }
    Ok(())
}

/// Print a built-in plan, ready to be edited and passed to `--plan-file`
///
/// # Errors
///
/// Returns error for an unknown plan or a serialization failure
pub fn show_plan(config: &CliConfig, args: &ShowPlanArgs) -> CliResult<()> {
    let plan = VerificationPlan::preset(&args.plan, args.base_url.as_deref())?;
    match config.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print!("{}", plan.to_yaml()?),
    }
    Ok(())
}

/// Print a mock payload as the backend would serve it
///
/// # Errors
///
/// Returns error for an unknown payload name
pub fn show_fixture(args: &FixtureArgs) -> CliResult<()> {
    let payload = PortfolioPayload::named(&args.name).ok_or_else(|| {
        CliError::invalid_argument(format!(
            "unknown fixture {:?} (known: {})",
            args.name,
            PortfolioPayload::NAMES.join(", ")
        ))
    })?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::Cli;
    use clap::Parser;
    use std::io::Write as _;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        cli.run_args().unwrap().clone()
    }

    mod load_plan_tests {
        use super::*;

        #[test]
        fn test_default_is_fire_preset() {
            let plan = load_plan(&run_args(&["fireshot"])).unwrap();
            assert_eq!(plan.name, "fire");
            assert_eq!(
                plan.navigation.final_url(),
                Some("http://localhost:5174/asset/fire")
            );
        }

        #[test]
        fn test_base_url_and_settle_override() {
            let plan = load_plan(&run_args(&[
                "fireshot",
                "--base-url",
                "http://127.0.0.1:9000/asset",
                "--settle-ms",
                "250",
            ]))
            .unwrap();
            assert_eq!(
                plan.navigation.final_url(),
                Some("http://127.0.0.1:9000/asset/fire")
            );
            assert_eq!(plan.settle, SettlePolicy::fixed(250));
        }

        #[test]
        fn test_unknown_preset() {
            let err = load_plan(&run_args(&["fireshot", "--plan", "nope"])).unwrap_err();
            assert!(err.to_string().contains("unknown plan"));
        }

        #[test]
        fn test_plan_file() {
            let yaml = VerificationPlan::preset("cash-flow", None)
                .unwrap()
                .to_yaml()
                .unwrap();
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(yaml.as_bytes()).unwrap();
            let path = file.path().to_str().unwrap();

            let plan = load_plan(&run_args(&["fireshot", "--plan-file", path])).unwrap();
            assert_eq!(plan.name, "cash-flow");

            let err = load_plan(&run_args(&[
                "fireshot",
                "--plan-file",
                path,
                "--base-url",
                "http://localhost:1/",
            ]))
            .unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument { .. }));
        }
    }

    mod browser_config_tests {
        use super::*;

        #[test]
        fn test_defaults_are_headless_sandboxed() {
            let config = browser_config(&run_args(&["fireshot"]));
            assert!(config.headless);
            assert!(config.sandbox);
            assert!(config.chromium_path.is_none());
        }

        #[test]
        fn test_flags() {
            let config = browser_config(&run_args(&[
                "fireshot",
                "--headed",
                "--no-sandbox",
                "--chromium-path",
                "/usr/bin/chromium",
            ]));
            assert!(!config.headless);
            assert!(!config.sandbox);
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        }
    }

    mod fixture_tests {
        use super::*;

        #[test]
        fn test_unknown_fixture() {
            let err = show_fixture(&FixtureArgs {
                name: "missing".into(),
            })
            .unwrap_err();
            assert!(err.to_string().contains("unknown fixture"));
        }
    }
}
