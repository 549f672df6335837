//! Harness runner - one verification run end to end.
//!
//! The run is a straight line: install interception, navigate, settle,
//! baseline, captures, checks. Any fault stops the line and is recorded once;
//! teardown always runs afterwards and its own failure is recorded apart.

use crate::browser::BrowserConfig;
use crate::capture::{capture, capture_baseline, ArtifactStore};
use crate::driver::PageDriver;
use crate::network::SharedInterception;
use crate::plan::VerificationPlan;
use crate::report::RunReport;
use crate::result::FireshotResult;
use crate::wait::settle;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Runs a [`VerificationPlan`] against a page driver
#[derive(Debug, Clone)]
pub struct Harness {
    plan: VerificationPlan,
    store: ArtifactStore,
    browser: BrowserConfig,
}

impl Harness {
    /// Harness writing artifacts into `output_dir`
    #[must_use]
    pub fn new(plan: VerificationPlan, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            plan,
            store: ArtifactStore::new(output_dir),
            browser: BrowserConfig::default(),
        }
    }

    /// Browser settings for [`Self::run_with_chromium`]
    #[must_use]
    pub fn with_browser(mut self, config: BrowserConfig) -> Self {
        self.browser = config;
        self
    }

    /// The plan being run
    #[must_use]
    pub const fn plan(&self) -> &VerificationPlan {
        &self.plan
    }

    /// Browser settings
    #[must_use]
    pub const fn browser(&self) -> &BrowserConfig {
        &self.browser
    }

    fn new_report(&self) -> RunReport {
        RunReport::new(&self.plan.name, self.store.dir())
    }

    /// Run the plan on `driver`, then close it
    pub async fn run<D: PageDriver + ?Sized>(&self, driver: &mut D) -> RunReport {
        let mut report = self.new_report();
        info!(plan = %self.plan.name, run = %report.run_id, "verification started");

        let interception = match self.plan.interception() {
            Ok(interception) => Some(interception.into_shared()),
            Err(e) => {
                report.failure = Some(e.to_string());
                None
            }
        };
        if let Some(ref interception) = interception {
            if let Err(e) = self.execute(driver, interception, &mut report).await {
                report.failure = Some(e.to_string());
            }
            report.intercepted = interception
                .lock()
                .map(|i| i.captured_requests().len())
                .unwrap_or(0);
        }
        if let Some(ref failure) = report.failure {
            error!(plan = %self.plan.name, "{failure}");
        }
        if report.intercepted == 0 && !self.plan.routes.is_empty() {
            info!("no request matched a mocked route");
        }

        if let Err(e) = driver.close().await {
            warn!(error = %e, "teardown failed");
            report.teardown_error = Some(e.to_string());
        }
        report.finish();
        info!(outcome = report.outcome().label(), "verification finished");
        report
    }

    async fn execute<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        interception: &SharedInterception,
        report: &mut RunReport,
    ) -> FireshotResult<()> {
        self.plan.validate()?;
        if !self.plan.routes.is_empty() {
            driver.install_interception(interception.clone()).await?;
        }

        self.plan
            .navigation
            .execute(driver, &mut report.steps)
            .await?;

        report.settle = Some(settle(driver, &self.plan.settle).await?);

        if let Some(ref baseline) = self.plan.baseline {
            report.baseline = Some(capture_baseline(driver, baseline, &self.store).await?);
        }

        for target in &self.plan.captures {
            let outcome = capture(driver, target, &self.store).await?;
            report.captures.push(outcome);
        }

        for expectation in &self.plan.expectations {
            report.checks.push(expectation.check(driver).await?);
        }
        Ok(())
    }

    /// Launch Chromium, run the plan, and shut the browser down
    #[cfg(feature = "browser")]
    pub async fn run_with_chromium(&self) -> RunReport {
        if let Err(e) = self.plan.validate() {
            return self.aborted(e.to_string());
        }
        match crate::browser::ChromiumDriver::launch(&self.browser).await {
            Ok(mut driver) => self.run(&mut driver).await,
            Err(e) => self.aborted(e.to_string()),
        }
    }

    #[cfg(feature = "browser")]
    fn aborted(&self, message: String) -> RunReport {
        error!(plan = %self.plan.name, "{message}");
        let mut report = self.new_report();
        report.failure = Some(message);
        report.finish();
        report
    }
}
