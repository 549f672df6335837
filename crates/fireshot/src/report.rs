//! Run report - aggregated outcomes of one verification run
//!
//! Every step of a run lands here: completed navigation steps, the settle
//! outcome, the baseline path, each capture outcome, each check, and at most
//! one fault. The [`RunOutcome`] derived from it drives the exit status.

use crate::capture::CaptureOutcome;
use crate::expectation::CheckResult;
use crate::wait::SettleOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

/// Overall result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Everything captured, every check passed
    Success,
    /// Run completed but a capture was skipped or a check failed
    Partial {
        /// What was missing
        missing: Vec<String>,
    },
    /// Run stopped on a fault
    Failed {
        /// The fault
        message: String,
    },
}

impl RunOutcome {
    /// Process exit code: 0 success, 1 failed, 2 partial
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed { .. } => 1,
            Self::Partial { .. } => 2,
        }
    }

    /// Short label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial { .. } => "partial",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Report of one verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Plan name
    pub plan: String,
    /// Output directory
    pub output_dir: PathBuf,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When teardown finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Completed navigation steps, in order
    pub steps: Vec<String>,
    /// How settling ended
    pub settle: Option<SettleOutcome>,
    /// Baseline screenshot
    pub baseline: Option<PathBuf>,
    /// Capture outcomes, in plan order
    pub captures: Vec<CaptureOutcome>,
    /// Check results, in plan order
    pub checks: Vec<CheckResult>,
    /// Requests fulfilled from mocked routes
    pub intercepted: usize,
    /// The fault that stopped the run
    pub failure: Option<String>,
    /// Teardown failure; never changes the outcome
    pub teardown_error: Option<String>,
}

impl RunReport {
    /// Start a report for `plan`
    #[must_use]
    pub fn new(plan: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            plan: plan.into(),
            output_dir: output_dir.into(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            settle: None,
            baseline: None,
            captures: Vec::new(),
            checks: Vec::new(),
            intercepted: 0,
            failure: None,
            teardown_error: None,
        }
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Run duration, once finished
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Derive the outcome
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        if let Some(ref message) = self.failure {
            return RunOutcome::Failed {
                message: message.clone(),
            };
        }
        let missing: Vec<String> = self
            .captures
            .iter()
            .filter_map(|c| match c {
                CaptureOutcome::Skipped { name, reason } => Some(format!("{name}: {reason}")),
                CaptureOutcome::Captured { .. } => None,
            })
            .chain(
                self.checks
                    .iter()
                    .filter(|c| !c.passed)
                    .map(|c| format!("{} (got {})", c.description, c.actual)),
            )
            .collect();
        if missing.is_empty() {
            RunOutcome::Success
        } else {
            RunOutcome::Partial { missing }
        }
    }

    /// Exit code; `lenient` always reports success
    #[must_use]
    pub fn exit_code(&self, lenient: bool) -> u8 {
        if lenient {
            0
        } else {
            self.outcome().exit_code()
        }
    }

    /// Every file written by the run
    #[must_use]
    pub fn artifacts(&self) -> Vec<&PathBuf> {
        self.baseline
            .iter()
            .chain(self.captures.iter().filter_map(|c| match c {
                CaptureOutcome::Captured { path, .. } => Some(path),
                CaptureOutcome::Skipped { .. } => None,
            }))
            .collect()
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> crate::FireshotResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text summary
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "plan {} (run {})", self.plan, self.run_id);
        for step in &self.steps {
            let _ = writeln!(out, "  step      {step}");
        }
        if let Some(ref settle) = self.settle {
            let _ = writeln!(
                out,
                "  settle    {:?} after {}ms",
                settle.status, settle.elapsed_ms
            );
        }
        let _ = writeln!(out, "  mocked    {} request(s)", self.intercepted);
        if let Some(ref path) = self.baseline {
            let _ = writeln!(out, "  baseline  {}", path.display());
        }
        for capture in &self.captures {
            match capture {
                CaptureOutcome::Captured {
                    name,
                    path,
                    expanded,
                    ..
                } => {
                    let state = expanded.map_or(String::new(), |e| format!(" (expanded={e})"));
                    let _ = writeln!(out, "  captured  {name}: {}{state}", path.display());
                }
                CaptureOutcome::Skipped { name, reason } => {
                    let _ = writeln!(out, "  skipped   {name}: {reason}");
                }
            }
        }
        for check in &self.checks {
            let mark = if check.passed { "ok" } else { "FAILED" };
            let _ = writeln!(out, "  check     {}: {mark}", check.description);
        }
        if let Some(ref failure) = self.failure {
            let _ = writeln!(out, "  error     {failure}");
        }
        if let Some(ref teardown) = self.teardown_error {
            let _ = writeln!(out, "  teardown  {teardown}");
        }
        let _ = write!(out, "outcome: {}", self.outcome().label());
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn captured(name: &str) -> CaptureOutcome {
        CaptureOutcome::Captured {
            name: name.into(),
            path: PathBuf::from(format!("{name}.png")),
            bytes: 10,
            expanded: None,
        }
    }

    fn skipped(name: &str) -> CaptureOutcome {
        CaptureOutcome::Skipped {
            name: name.into(),
            reason: "not found".into(),
        }
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_empty_report_is_success() {
            let report = RunReport::new("fire", ".");
            assert_eq!(report.outcome(), RunOutcome::Success);
            assert_eq!(report.exit_code(false), 0);
        }

        #[test]
        fn test_skipped_capture_is_partial() {
            let mut report = RunReport::new("fire", ".");
            report.captures = vec![captured("table"), skipped("details")];
            let outcome = report.outcome();
            assert_eq!(
                outcome,
                RunOutcome::Partial {
                    missing: vec!["details: not found".into()]
                }
            );
            assert_eq!(report.exit_code(false), 2);
            assert_eq!(report.exit_code(true), 0);
        }

        #[test]
        fn test_failed_check_is_partial() {
            let mut report = RunReport::new("fire", ".");
            report.checks.push(CheckResult {
                description: "page contains \"電気代\"".into(),
                passed: false,
                actual: "120 bytes".into(),
            });
            assert_eq!(report.outcome().exit_code(), 2);
        }

        #[test]
        fn test_failure_wins() {
            let mut report = RunReport::new("fire", ".");
            report.captures.push(skipped("table"));
            report.failure = Some("Navigation to x failed: refused".into());
            assert_eq!(report.exit_code(false), 1);
            assert_eq!(report.exit_code(true), 0);
        }

        #[test]
        fn test_teardown_error_does_not_change_outcome() {
            let mut report = RunReport::new("fire", ".");
            report.teardown_error = Some("browser close failed".into());
            assert_eq!(report.outcome(), RunOutcome::Success);
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_artifacts_list() {
            let mut report = RunReport::new("fire", ".");
            report.baseline = Some(PathBuf::from("debug_fire_3.png"));
            report.captures = vec![captured("table"), skipped("details")];
            assert_eq!(
                report.artifacts(),
                vec![&PathBuf::from("debug_fire_3.png"), &PathBuf::from("table.png")]
            );
        }

        #[test]
        fn test_text_summary() {
            let mut report = RunReport::new("fire", ".");
            report.steps.push("reload".into());
            report.captures = vec![captured("table"), skipped("details")];
            let text = report.render_text();
            assert!(text.contains("step      reload"));
            assert!(text.contains("captured  table: table.png"));
            assert!(text.contains("skipped   details: not found"));
            assert!(text.ends_with("outcome: partial"));
        }

        #[test]
        fn test_json_shape() {
            let mut report = RunReport::new("fire", "/tmp/out");
            report.finish();
            let json: serde_json::Value =
                serde_json::from_str(&report.to_json().unwrap()).unwrap();
            assert_eq!(json["plan"], "fire");
            assert!(json["run_id"].is_string());
            assert!(json["finished_at"].is_string());
            assert!(report.duration_ms().unwrap() >= 0);
        }
    }
}
