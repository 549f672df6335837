//! DOM expectations checked after the captures.
//!
//! Expectations never abort a run. Each is evaluated once and recorded as
//! passed or failed; any failure makes the run outcome partial.

use crate::driver::PageDriver;
use crate::fixture::parse_yen;
use crate::locator::Selector;
use crate::result::FireshotResult;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A check against the rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// First match is rendered
    Visible {
        /// Element to check
        selector: Selector,
    },
    /// First match's text contains `text`
    ContainsText {
        /// Element to check
        selector: Selector,
        /// Expected substring
        text: String,
    },
    /// First match's text parses to this yen amount
    YenAmount {
        /// Element to check
        selector: Selector,
        /// Expected amount
        amount: i64,
    },
    /// Serialized document contains `text`
    PageContains {
        /// Expected substring
        text: String,
    },
    /// More than `min` elements match
    MinCount {
        /// Elements to count
        selector: Selector,
        /// Exclusive lower bound
        min: usize,
    },
}

impl Expectation {
    /// Human-readable description
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Visible { selector } => format!("{selector} is visible"),
            Self::ContainsText { selector, text } => format!("{selector} contains {text:?}"),
            Self::YenAmount { selector, amount } => {
                format!("{selector} shows {}", crate::fixture::format_yen(*amount))
            }
            Self::PageContains { text } => format!("page contains {text:?}"),
            Self::MinCount { selector, min } => format!("more than {min} {selector}"),
        }
    }

    /// Evaluate against the current page
    ///
    /// # Errors
    ///
    /// Propagates driver failures; an unmet expectation is a failed check.
    pub async fn check<D: PageDriver + ?Sized>(&self, driver: &D) -> FireshotResult<CheckResult> {
        let (passed, actual) = match self {
            Self::Visible { selector } => {
                let visible = driver.is_visible(selector).await?;
                (visible, format!("visible={visible}"))
            }
            Self::ContainsText { selector, text } => {
                let actual = driver.text_content(selector).await?;
                (
                    actual.as_deref().is_some_and(|t| t.contains(text.as_str())),
                    describe_text(actual.as_deref()),
                )
            }
            Self::YenAmount { selector, amount } => {
                let actual = driver.text_content(selector).await?;
                (
                    actual.as_deref().and_then(parse_yen) == Some(*amount),
                    describe_text(actual.as_deref()),
                )
            }
            Self::PageContains { text } => {
                let content = driver.page_content().await?;
                (content.contains(text.as_str()), format!("{} bytes", content.len()))
            }
            Self::MinCount { selector, min } => {
                let count = driver.count(selector).await?;
                (count > *min, format!("count={count}"))
            }
        };
        let result = CheckResult {
            description: self.describe(),
            passed,
            actual,
        };
        if result.passed {
            info!(check = %result.description, "passed");
        } else {
            warn!(check = %result.description, actual = %result.actual, "failed");
        }
        Ok(result)
    }
}

fn describe_text(text: Option<&str>) -> String {
    text.map_or_else(|| "no match".to_string(), |t| format!("{:?}", t.trim()))
}

/// Outcome of one expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// What was checked
    pub description: String,
    /// Whether it held
    pub passed: bool,
    /// What was observed
    pub actual: String,
}
