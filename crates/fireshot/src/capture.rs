//! Conditional capture of page regions.
//!
//! A [`CaptureTarget`] is probed first. When nothing matches, the capture is
//! skipped with a warning and the run continues. When something matches, the
//! optional interaction runs, then the region element is screenshotted into
//! the [`ArtifactStore`] under a fixed file name.

use crate::driver::{PageDriver, Screenshot};
use crate::locator::Selector;
use crate::result::FireshotResult;
use crate::wait::DEFAULT_INTERACTION_SETTLE_MS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Interaction performed on a present target before capturing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    /// Click the probed element, then pause
    Click {
        /// Pause after the click
        #[serde(default = "default_interaction_settle")]
        settle_ms: u64,
    },
}

const fn default_interaction_settle() -> u64 {
    DEFAULT_INTERACTION_SETTLE_MS
}

impl Interaction {
    /// Click with the default 500 ms pause
    #[must_use]
    pub const fn click() -> Self {
        Self::Click {
            settle_ms: DEFAULT_INTERACTION_SETTLE_MS,
        }
    }
}

/// A region to capture if it exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTarget {
    /// Name used in logs and the report
    pub name: String,
    /// Presence probe; also the element interacted with
    pub probe: Selector,
    /// Element whose box is captured (defaults to the probe)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Selector>,
    /// Optional interaction before the screenshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<Interaction>,
    /// Artifact file name inside the output directory
    pub file_name: String,
}

impl CaptureTarget {
    /// Passive capture of the probed element
    #[must_use]
    pub fn new(name: impl Into<String>, probe: Selector, file_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probe,
            region: None,
            interaction: None,
            file_name: file_name.into(),
        }
    }

    /// Capture a different element than the one probed
    #[must_use]
    pub fn with_region(mut self, region: Selector) -> Self {
        self.region = Some(region);
        self
    }

    /// Interact with the probed element before capturing
    #[must_use]
    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = Some(interaction);
        self
    }

    /// Element whose box is captured
    #[must_use]
    pub fn region(&self) -> &Selector {
        self.region.as_ref().unwrap_or(&self.probe)
    }
}

/// Unconditional page screenshot taken after settling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    /// Artifact file name
    pub file_name: String,
    /// Capture the whole scrollable page instead of the viewport
    #[serde(default)]
    pub full_page: bool,
}

impl Baseline {
    /// Viewport baseline
    #[must_use]
    pub fn viewport(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            full_page: false,
        }
    }

    /// Full-page baseline
    #[must_use]
    pub fn full_page(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            full_page: true,
        }
    }
}

/// What happened to a capture target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// Screenshot written
    Captured {
        /// Target name
        name: String,
        /// Written file
        path: PathBuf,
        /// PNG size in bytes
        bytes: usize,
        /// Expanded state after an interaction
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expanded: Option<bool>,
    },
    /// Probe found nothing
    Skipped {
        /// Target name
        name: String,
        /// Why it was skipped
        reason: String,
    },
}

impl CaptureOutcome {
    /// Target name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Captured { name, .. } | Self::Skipped { name, .. } => name,
        }
    }

    /// Whether a file was written
    #[must_use]
    pub const fn is_captured(&self) -> bool {
        matches!(self, Self::Captured { .. })
    }
}

/// Directory artifacts are written into
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ArtifactStore {
    /// Store rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact is written to
    #[must_use]
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Write a screenshot, replacing any earlier file of the same name
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the file written
    pub async fn write(&self, file_name: &str, screenshot: &Screenshot) -> FireshotResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(file_name);
        tokio::fs::write(&path, &screenshot.data).await?;
        info!(path = %path.display(), bytes = screenshot.size_bytes(), "screenshot saved");
        Ok(path)
    }
}

/// Take the unconditional page screenshot
///
/// # Errors
///
/// Propagates screenshot and I/O failures
pub async fn capture_baseline<D: PageDriver + ?Sized>(
    driver: &D,
    baseline: &Baseline,
    store: &ArtifactStore,
) -> FireshotResult<PathBuf> {
    let shot = driver.screenshot_page(baseline.full_page).await?;
    store.write(&baseline.file_name, &shot).await
}

/// Probe `target` and capture it if present
///
/// # Errors
///
/// Propagates driver and I/O failures; absence is a `Skipped` outcome.
pub async fn capture<D: PageDriver + ?Sized>(
    driver: &mut D,
    target: &CaptureTarget,
    store: &ArtifactStore,
) -> FireshotResult<CaptureOutcome> {
    let count = driver.count(&target.probe).await?;
    if count == 0 {
        warn!(capture = %target.name, probe = %target.probe, "not found; skipping capture");
        return Ok(CaptureOutcome::Skipped {
            name: target.name.clone(),
            reason: format!("{} not found", target.probe),
        });
    }

    let expanded = match target.interaction {
        Some(Interaction::Click { settle_ms }) => {
            info!(capture = %target.name, "clicking");
            driver.click(&target.probe).await?;
            tokio::time::sleep(Duration::from_millis(settle_ms)).await;
            driver.is_expanded(&target.probe).await?
        }
        None => None,
    };

    let shot = driver.screenshot_element(target.region()).await?;
    let path = store.write(&target.file_name, &shot).await?;
    Ok(CaptureOutcome::Captured {
        name: target.name.clone(),
        path,
        bytes: shot.size_bytes(),
        expanded,
    })
}
