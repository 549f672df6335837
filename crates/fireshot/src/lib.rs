//! Fireshot: visual verification harness for the asset portfolio application
//!
//! Drives headless Chromium against a running build of the application,
//! fulfils its backend calls from a fixed dataset, injects a session token,
//! navigates to the view under test and captures screenshots of the regions
//! that rendered.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────┐   ┌──────────────┐
//! │ Verification │──►│ Navigation │──►│ Settle   │──►│ Conditional  │
//! │ Plan         │   │ + Storage  │   │ (sleep / │   │ Capture +    │
//! │ (preset/YAML)│   │ + Fetch    │   │  poll)   │   │ Expectations │
//! └──────────────┘   └────────────┘   └──────────┘   └──────┬───────┘
//!                                                           ▼
//!                                                     ┌──────────┐
//!                                                     │RunReport │
//!                                                     └──────────┘
//! ```
//!
//! Everything talks to the page through [`PageDriver`]; the Chromium
//! implementation needs the `browser` feature, [`MockDriver`] needs nothing.

#![warn(missing_docs)]

mod browser;
mod capture;
mod driver;
mod expectation;
mod fixture;
mod harness;
mod locator;
mod navigation;
mod network;
mod plan;
mod report;
mod result;
mod storage;
mod wait;

pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use capture::{
    capture, capture_baseline, ArtifactStore, Baseline, CaptureOutcome, CaptureTarget,
    Interaction,
};
pub use driver::{
    MockApp, MockDriver, MockElement, MockText, MockView, PageDriver, Screenshot, MOCK_ASSET_API,
    PNG_MAGIC,
};
pub use expectation::{CheckResult, Expectation};
pub use fixture::{
    format_yen, parse_yen, AssetClass, CashFlowEntry, HoldingRow, Holdings, PortfolioPayload,
    Summary, Totals, BALANCE_FIELD, CASH_CLASS, STOCK_CLASS, VALUATION_FIELD,
};
pub use harness::Harness;
pub use locator::{BoundingBox, Selector};
pub use navigation::{NavStep, NavigationPlan};
pub use network::{
    CapturedRequest, HttpMethod, MockResponse, NetworkInterception, PausedRequest, Route,
    SharedInterception, UrlPattern, CORS_ALLOW_METHODS,
};
pub use plan::{
    RouteBody, RouteSpec, VerificationPlan, BACKEND_PATTERN, DEFAULT_BASE_URL,
    DEV_SERVER_BASE_URL, PRESETS,
};
pub use report::{RunOutcome, RunReport};
pub use result::{FireshotError, FireshotResult};
pub use storage::{storage_origin, StorageEntry, MOCK_SESSION_TOKEN, SESSION_TOKEN_KEY};
pub use wait::{
    settle, SettleOutcome, SettlePolicy, SettleStatus, DEFAULT_INTERACTION_SETTLE_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        BrowserConfig, CaptureOutcome, CaptureTarget, Expectation, FireshotError, FireshotResult,
        Harness, Interaction, MockApp, MockDriver, NavigationPlan, PageDriver, PortfolioPayload,
        RunOutcome, RunReport, Selector, SettlePolicy, StorageEntry, VerificationPlan,
    };
}
