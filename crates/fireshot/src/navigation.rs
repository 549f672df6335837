//! Navigation sequencing.
//!
//! The session token must be written while a document of the target origin
//! is loaded and before the target view initializes. A [`NavigationPlan`] is
//! the ordered list of steps that gets it there; the canonical shape is built
//! by [`NavigationPlan::authenticated`].

use crate::driver::PageDriver;
use crate::result::{FireshotError, FireshotResult};
use crate::storage::StorageEntry;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One step of a navigation plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavStep {
    /// Load a URL and wait for the load event
    Goto(String),
    /// Write into storage of the loaded origin
    WriteStorage(StorageEntry),
    /// Register a storage write for every new document
    SeedStorage(StorageEntry),
    /// Reload the current document
    Reload,
}

impl NavStep {
    /// Short label used in logs and reports
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Goto(url) => format!("goto {url}"),
            Self::WriteStorage(entry) => format!("write storage {}", entry.key),
            Self::SeedStorage(entry) => format!("seed storage {}", entry.key),
            Self::Reload => "reload".to_string(),
        }
    }

    /// Whether the step loads a document
    #[must_use]
    pub const fn is_navigation(&self) -> bool {
        matches!(self, Self::Goto(_) | Self::Reload)
    }
}

/// Ordered navigation steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationPlan {
    steps: Vec<NavStep>,
}

impl NavigationPlan {
    /// Create an empty plan
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: NavStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a `Goto`
    #[must_use]
    pub fn goto(self, url: impl Into<String>) -> Self {
        self.step(NavStep::Goto(url.into()))
    }

    /// Append a `WriteStorage`
    #[must_use]
    pub fn write_storage(self, entry: StorageEntry) -> Self {
        self.step(NavStep::WriteStorage(entry))
    }

    /// Append a `SeedStorage`
    #[must_use]
    pub fn seed_storage(self, entry: StorageEntry) -> Self {
        self.step(NavStep::SeedStorage(entry))
    }

    /// Append a `Reload`
    #[must_use]
    pub fn reload(self) -> Self {
        self.step(NavStep::Reload)
    }

    /// Load `entry_url`, write `token`, load `target_url`, reload
    #[must_use]
    pub fn authenticated(
        entry_url: impl Into<String>,
        target_url: impl Into<String>,
        token: StorageEntry,
    ) -> Self {
        Self::new()
            .goto(entry_url)
            .write_storage(token)
            .goto(target_url)
            .reload()
    }

    /// Steps in order
    #[must_use]
    pub fn steps(&self) -> &[NavStep] {
        &self.steps
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// URL of the last `Goto`
    #[must_use]
    pub fn final_url(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|s| match s {
            NavStep::Goto(url) => Some(url.as_str()),
            _ => None,
        })
    }

    /// Reject plans that cannot work in any browser
    ///
    /// # Errors
    ///
    /// Returns [`FireshotError::InvalidPlan`] for an empty plan, a plan that
    /// never navigates, a `Goto` that is not an http(s) URL with a host, or a
    /// `WriteStorage`/`Reload` before the first `Goto`.
    pub fn validate(&self) -> FireshotResult<()> {
        if self.steps.is_empty() {
            return Err(FireshotError::invalid_plan("navigation plan has no steps"));
        }
        let mut loaded = false;
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                NavStep::Goto(url) => {
                    let parsed = url::Url::parse(url).map_err(|e| {
                        FireshotError::invalid_plan(format!("step {index}: {url:?}: {e}"))
                    })?;
                    if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
                        return Err(FireshotError::invalid_plan(format!(
                            "step {index}: {url:?} is not an http(s) URL"
                        )));
                    }
                    loaded = true;
                }
                NavStep::WriteStorage(entry) if !loaded => {
                    return Err(FireshotError::invalid_plan(format!(
                        "step {index}: storage write of {:?} before any page is loaded",
                        entry.key
                    )));
                }
                NavStep::Reload if !loaded => {
                    return Err(FireshotError::invalid_plan(format!(
                        "step {index}: reload before any page is loaded"
                    )));
                }
                _ => {}
            }
        }
        if loaded {
            Ok(())
        } else {
            Err(FireshotError::invalid_plan("navigation plan never loads a page"))
        }
    }

    /// Run every step in order, stopping at the first failure
    ///
    /// Returns the labels of the completed steps.
    ///
    /// # Errors
    ///
    /// Propagates the first driver error.
    pub async fn execute<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        completed: &mut Vec<String>,
    ) -> FireshotResult<()> {
        for step in &self.steps {
            info!(step = %step.label(), "navigation");
            match step {
                NavStep::Goto(url) => driver.goto(url).await?,
                NavStep::WriteStorage(entry) => driver.write_storage(entry).await?,
                NavStep::SeedStorage(entry) => driver.seed_storage(entry).await?,
                NavStep::Reload => driver.reload().await?,
            }
            completed.push(step.label());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::{MockApp, MockDriver};

    const ROOT: &str = "http://localhost:5174/asset/";
    const FIRE: &str = "http://localhost:5174/asset/fire";

    mod validate_tests {
        use super::*;

        #[test]
        fn test_canonical_plan_is_valid() {
            let plan = NavigationPlan::authenticated(ROOT, FIRE, StorageEntry::session_token());
            assert!(plan.validate().is_ok());
            assert_eq!(plan.len(), 4);
            assert_eq!(plan.final_url(), Some(FIRE));
        }

        #[test]
        fn test_empty_plan_rejected() {
            assert!(matches!(
                NavigationPlan::new().validate(),
                Err(FireshotError::InvalidPlan { .. })
            ));
        }

        #[test]
        fn test_write_before_goto_rejected() {
            let plan = NavigationPlan::new()
                .write_storage(StorageEntry::session_token())
                .goto(FIRE);
            let err = plan.validate().unwrap_err();
            assert!(err.to_string().contains("before any page is loaded"));
        }

        #[test]
        fn test_seed_before_goto_allowed() {
            let plan = NavigationPlan::new()
                .seed_storage(StorageEntry::session_token())
                .goto(FIRE);
            assert!(plan.validate().is_ok());
        }

        #[test]
        fn test_late_write_is_valid() {
            let plan = NavigationPlan::new()
                .goto(FIRE)
                .write_storage(StorageEntry::session_token());
            assert!(plan.validate().is_ok());
        }

        #[test]
        fn test_bad_url_rejected() {
            let plan = NavigationPlan::new().goto("localhost:5174 /asset");
            assert!(plan.validate().is_err());
        }

        #[test]
        fn test_non_web_urls_rejected() {
            for url in ["localhost:5174/asset/", "file:///tmp/fire.html", "about:blank"] {
                let err = NavigationPlan::new().goto(url).validate().unwrap_err();
                assert!(err.to_string().contains("not an http(s) URL"), "{url}: {err}");
            }
        }

        #[test]
        fn test_yaml_shape() {
            let yaml = "- goto: http://localhost:5174/asset/\n\
                        - write_storage: { key: asset-google-id-token, value: mock-token }\n\
                        - reload\n";
            let plan: NavigationPlan = crate::plan::parse_yaml(yaml).unwrap();
            assert_eq!(
                plan,
                NavigationPlan::new()
                    .goto(ROOT)
                    .write_storage(StorageEntry::session_token())
                    .reload()
            );
        }
    }

    mod execute_tests {
        use super::*;

        #[tokio::test]
        async fn test_steps_run_in_order() {
            let mut driver = MockDriver::new(MockApp::asset_portfolio());
            let plan = NavigationPlan::authenticated(ROOT, FIRE, StorageEntry::session_token());
            let mut completed = Vec::new();
            plan.execute(&mut driver, &mut completed).await.unwrap();

            assert_eq!(
                driver.history(),
                vec![
                    format!("goto:{ROOT}"),
                    "write_storage:asset-google-id-token".to_string(),
                    format!("goto:{FIRE}"),
                    "reload".to_string(),
                ]
            );
            assert_eq!(completed.len(), 4);
        }

        #[tokio::test]
        async fn test_stops_at_first_failure() {
            let mut driver = MockDriver::new(MockApp::asset_portfolio()).failing("goto", "refused");
            let plan = NavigationPlan::authenticated(ROOT, FIRE, StorageEntry::session_token());
            let mut completed = Vec::new();
            let err = plan.execute(&mut driver, &mut completed).await.unwrap_err();

            assert!(matches!(err, FireshotError::NavigationError { .. }));
            assert!(completed.is_empty());
            assert_eq!(driver.history().len(), 1);
        }
    }
}
