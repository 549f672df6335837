//! Output formatting and progress reporting

use console::{style, Term};
use fireshot::{CaptureOutcome, RunOutcome, RunReport};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// Spinner currently drawn on stderr, if any
static ACTIVE_SPINNER: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn set_active_spinner(spinner: Option<ProgressBar>) {
    if let Ok(mut slot) = ACTIVE_SPINNER.lock() {
        *slot = spinner;
    }
}

fn active_spinner() -> Option<ProgressBar> {
    ACTIVE_SPINNER.lock().ok().and_then(|slot| slot.clone())
}

/// Stderr writer for log lines.
///
/// While a [`ProgressReporter`] spinner runs, each line is written with the
/// spinner cleared and redrawn after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWriter;

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_spinner() {
            Some(pb) => pb.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        *self
    }
}

/// Output format for reports and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Progress reporter for a verification run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Start a spinner while the browser works
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        set_active_spinner(Some(pb.clone()));
        self.spinner = Some(pb);
    }

    /// Clear the spinner
    pub fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            set_active_spinner(None);
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Report the overall outcome of a run
    pub fn outcome(&self, report: &RunReport) {
        let artifacts = report.artifacts().len();
        match report.outcome() {
            RunOutcome::Success => self.success(&format!(
                "{}: {artifacts} screenshot(s) in {}",
                report.plan,
                report.output_dir.display()
            )),
            RunOutcome::Partial { missing } => {
                for item in &missing {
                    self.warning(item);
                }
                self.warning(&format!(
                    "{}: partial, {artifacts} screenshot(s), {} missing",
                    report.plan,
                    missing.len()
                ));
            }
            RunOutcome::Failed { message } => {
                self.failure(&format!("{}: {message}", report.plan));
            }
        }
    }
}

/// Render a run report for the terminal
#[must_use]
pub fn render_report(report: &RunReport, use_color: bool) -> String {
    if !use_color {
        return report.render_text();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        style("plan").bold(),
        style(&report.plan).cyan().bold()
    );
    for step in &report.steps {
        let _ = writeln!(out, "  {} {step}", style("→").dim());
    }
    if let Some(ref path) = report.baseline {
        let _ = writeln!(out, "  {} baseline {}", style("✓").green(), path.display());
    }
    for capture in &report.captures {
        match capture {
            CaptureOutcome::Captured { name, path, .. } => {
                let _ = writeln!(out, "  {} {name} {}", style("✓").green(), path.display());
            }
            CaptureOutcome::Skipped { name, reason } => {
                let _ = writeln!(
                    out,
                    "  {} {name} {}",
                    style("⚠").yellow(),
                    style(reason).dim()
                );
            }
        }
    }
    for check in &report.checks {
        let mark = if check.passed {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let _ = writeln!(out, "  {mark} {} ({})", check.description, check.actual);
    }
    if let Some(ref failure) = report.failure {
        let _ = writeln!(out, "  {} {failure}", style("✗").red().bold());
    }
    if let Some(ref teardown) = report.teardown_error {
        let _ = writeln!(out, "  {} teardown: {teardown}", style("⚠").yellow());
    }
    let outcome = report.outcome();
    let label = match outcome {
        RunOutcome::Success => style(outcome.label()).green().bold(),
        RunOutcome::Partial { .. } => style(outcome.label()).yellow().bold(),
        RunOutcome::Failed { .. } => style(outcome.label()).red().bold(),
    };
    let _ = write!(
        out,
        "outcome: {label} ({} request(s) mocked)",
        report.intercepted
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report() -> RunReport {
        let mut report = RunReport::new("fire", "shots");
        report.steps.push("goto http://localhost:5174/asset/fire".into());
        report.baseline = Some(PathBuf::from("shots/debug_fire_3.png"));
        report.captures.push(CaptureOutcome::Skipped {
            name: "simulation table".into(),
            reason: "no element matches .simulation-table".into(),
        });
        report.finish();
        report
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_default_format() {
            assert_eq!(OutputFormat::default(), OutputFormat::Text);
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_plain_render_matches_library_text() {
            let report = report();
            assert_eq!(render_report(&report, false), report.render_text());
        }

        #[test]
        fn test_color_render_lists_everything() {
            console::set_colors_enabled(true);
            let text = render_report(&report(), true);
            assert!(text.contains("debug_fire_3.png"));
            assert!(text.contains("simulation table"));
            assert!(text.contains("partial"));
        }
    }

    mod reporter_tests {
        use super::*;
        use std::io::Write as _;

        #[test]
        fn test_quiet_reporter_has_no_spinner() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_spinner("running");
            assert!(reporter.spinner.is_none());
            reporter.finish();
        }

        #[test]
        fn test_log_lines_go_around_running_spinner() {
            let pb = ProgressBar::hidden();
            let mut reporter = ProgressReporter::new(false, false);
            set_active_spinner(Some(pb.clone()));
            reporter.spinner = Some(pb.clone());

            let line = b"WARN ready selector not seen; continuing\n";
            assert_eq!(LogWriter.make_writer().write(line).unwrap(), line.len());
            assert!(!pb.is_finished());

            reporter.finish();
            assert!(active_spinner().is_none());
            assert!(pb.is_finished());
            assert_eq!(LogWriter.write(b"after\n").unwrap(), 6);
        }

        #[test]
        fn test_outcome_does_not_panic() {
            let reporter = ProgressReporter::new(false, false);
            reporter.outcome(&report());
        }
    }
}
